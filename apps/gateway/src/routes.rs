//! HTTP routes: health check and read-only membership views.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use roomcast::{ConnectionLookup, RoomMap};
use serde::Serialize;

use crate::error::GatewayError;
use crate::gateway;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub namespace: String,
    pub connections: usize,
    pub rooms: usize,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: RoomMap,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub connection_id: String,
    pub rooms: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/rooms", get(rooms))
        .route("/connections/{id}/rooms", get(connection_rooms))
        .merge(gateway::server::router())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        namespace: state.engine.namespace().to_string(),
        connections: state.connections.len(),
        rooms: state.registry.room_count(),
    })
}

async fn rooms(State(state): State<AppState>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        rooms: state.registry.snapshot(),
    })
}

async fn connection_rooms(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MembershipResponse>, GatewayError> {
    if !state.connections.is_live(&id) {
        return Err(GatewayError::not_found("Connection not found"));
    }
    let rooms = state.registry.membership_of(&id).into_iter().collect();
    Ok(Json(MembershipResponse {
        connection_id: id,
        rooms,
    }))
}
