//! Handler for run submission.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use comfyremote_core::run::{prepare, RunRequest};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/runs
///
/// Load the named workflow, apply the request's overrides and seed
/// control, and submit it to ComfyUI. Returns 201 with the queued job;
/// execution is followed in the background.
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> AppResult<impl IntoResponse> {
    if request.workflow_name.trim().is_empty() {
        return Err(AppError::BadRequest("workflow_name must not be empty".into()));
    }

    let document = state.workflows.load(&request.workflow_name).await?;
    let run = prepare(document, &request.inputs, &request.seed_control)?;
    let job = state.tracker.submit(&request.workflow_name, run).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}
