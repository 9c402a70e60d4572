//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use comfyremote_core::job::{Job, DEFAULT_LIST_LIMIT};

use crate::error::AppResult;
use crate::query::LimitParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Most recent jobs first. `limit` defaults to 20 and is capped at the
/// history capacity.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<DataResponse<Vec<Job>>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(state.config.job_history_capacity);

    let jobs = state.tracker.list(limit).await;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = state.tracker.get(&id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/stop
///
/// Stop a queued or running job. Returns 409 if the job already finished.
pub async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = state.tracker.stop(&id).await?;
    Ok(Json(DataResponse { data: job }))
}
