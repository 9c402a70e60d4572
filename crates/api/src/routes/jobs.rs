//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /              -> list_jobs
/// GET    /{id}          -> get_job
/// POST   /{id}/stop     -> stop_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/stop", post(jobs::stop_job))
}
