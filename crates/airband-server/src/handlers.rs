//! REST endpoint handlers.
//!
//! Both endpoints are read-only views of the registry.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/devices` | Device snapshot, same shape dashboards receive |
//! | `GET` | `/api/health` | Liveness probe with per-role counts |

use std::sync::Arc;

use airband_session::RegistryStats;
use airband_types::DeviceSummary;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers.
    pub status: &'static str,
    /// Current registry counts.
    #[serde(flatten)]
    pub stats: RegistryStats,
}

/// List every live device.
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceSummary>> {
    Json(state.registry().snapshot_devices().await)
}

/// Report that the server is up, with device, dashboard and screen counts.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stats: state.registry().stats().await,
    })
}
