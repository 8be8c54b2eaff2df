// Public API for integration tests and the binary

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod protocol;
pub mod state;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Routes: `/ws` for the session protocol, `/health` for probes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(api::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
