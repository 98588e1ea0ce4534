//! Axum router construction.
//!
//! Assembles the `WebSocket` accept hook and the REST endpoints into a
//! single [`Router`] with CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET {ws_path}` -- `WebSocket` session for devices, dashboards and screens
/// - `GET /api/devices` -- device snapshot
/// - `GET /api/health` -- liveness probe
///
/// CORS allows any origin so browser dashboards can be served from
/// elsewhere.
pub fn build_router(state: Arc<AppState>, ws_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(ws_path, get(ws::ws_session))
        .route("/api/devices", get(handlers::list_devices))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
