//! Gateway wire-format messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorDetail;

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A control message sent from the server to the client over WebSocket.
/// Broadcast packets are sent as encoded by the engine, not wrapped here.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    pub d: Value,
}

impl ServerMessage {
    /// Sent once after upgrade, carrying the connection's ID.
    pub fn hello(connection_id: &str) -> Self {
        Self {
            op: "hello",
            t: None,
            d: serde_json::json!({ "connection_id": connection_id }),
        }
    }

    /// Acknowledge a client op.
    pub fn ack(op: &str, data: Value) -> Self {
        Self {
            op: "ack",
            t: Some(op.to_string()),
            d: data,
        }
    }

    pub fn error(detail: ErrorDetail) -> Self {
        Self {
            op: "error",
            t: None,
            d: serde_json::json!({ "code": detail.code, "message": detail.message }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        room: String,
    },
    Leave {
        room: String,
    },
    Emit {
        event: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        rooms: Vec<String>,
        #[serde(default)]
        except: Vec<String>,
        #[serde(default)]
        volatile: bool,
    },
}

impl ClientMessage {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Emit { .. } => "emit",
        }
    }
}
