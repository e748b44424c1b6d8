use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tryon_db::{BackendKind, SessionStore};

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status: `ok`, or `degraded` when the store ping
    /// fails.
    pub status: &'static str,
    /// Which persistence engine was selected at startup.
    pub backend_kind: BackendKind,
    /// Whether the store currently answers a ping.
    pub connected: bool,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

/// GET /health -- service, backend, and connectivity status.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.store.ping().await;

    Json(HealthResponse {
        status: if connected { "ok" } else { "degraded" },
        backend_kind: state.store.backend_kind(),
        connected,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
