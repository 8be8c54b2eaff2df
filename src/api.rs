//! HTTP endpoints next to the WebSocket.
//!
//! Only the liveness probe lives here; room state is never exposed over HTTP.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub server_now: String,
    pub connections: usize,
    pub rooms: usize,
    pub active_polls: usize,
}

/// Liveness probe.
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let session = state.session.lock().await;
    Json(HealthResponse {
        status: "ok",
        server_now: chrono::Utc::now().to_rfc3339(),
        connections: session.hub.len(),
        rooms: session.rooms.room_count(),
        active_polls: session.polls.active_count(),
    })
}
