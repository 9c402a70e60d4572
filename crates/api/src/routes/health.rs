use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether ComfyUI answered a queue query.
    pub engine_healthy: bool,
    /// Pollers still following jobs.
    pub active_jobs: usize,
}

/// GET /health -- returns service and ComfyUI health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_healthy = state.engine.queue().await.is_ok();

    let status = if engine_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        engine_healthy,
        active_jobs: state.tracker.active_pollers().await,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
