use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Structured error returned to HTTP clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Gateway error, rendered as an HTTP response or a socket `error` frame.
#[derive(Debug)]
pub struct GatewayError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl GatewayError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn forbidden_room(room: &str) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN_ROOM",
            format!("room `{room}` is a connection's own room"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.code.clone(),
            message: self.message.clone(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.detail(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<roomcast::Error> for GatewayError {
    fn from(err: roomcast::Error) -> Self {
        match err {
            roomcast::Error::InvalidRoomName => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_ROOM_NAME", err.to_string())
            }
            roomcast::Error::RoomNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", err.to_string())
            }
            roomcast::Error::EncodingFailed(_) | roomcast::Error::DispatchFailed { .. } => {
                tracing::error!(?err, "broadcast error");
                Self::internal("An internal error occurred")
            }
        }
    }
}
