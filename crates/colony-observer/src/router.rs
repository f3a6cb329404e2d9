//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/events` -- `WebSocket` event stream, filtered by room
/// - `GET /api/health` -- scheduler health
/// - `GET /api/ticks/stats` -- tick timing statistics
/// - `GET /api/ticks/report` -- plain-text performance report
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/events", get(ws::ws_events))
        .route("/api/health", get(handlers::health))
        .route("/api/ticks/stats", get(handlers::tick_stats))
        .route("/api/ticks/report", get(handlers::tick_report))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
