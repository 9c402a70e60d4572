//! Pass-through handlers for the ComfyUI queue and output files.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use comfyremote_core::engine::QueueSnapshot;
use comfyremote_core::error::CoreError;
use comfyremote_core::job::ArtifactRef;

use crate::error::{AppError, AppResult};
use crate::query::ViewParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Content type used when ComfyUI does not report one.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// GET /api/v1/engine/queue
pub async fn get_queue(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<QueueSnapshot>>> {
    let queue = state.engine.queue().await.map_err(CoreError::from)?;
    Ok(Json(DataResponse { data: queue }))
}

/// GET /api/v1/engine/view?filename=&subfolder=&type=
///
/// Proxy an output file from ComfyUI, preserving its content type.
pub async fn view_artifact(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> AppResult<impl IntoResponse> {
    if params.filename.is_empty() {
        return Err(AppError::BadRequest("filename must not be empty".into()));
    }

    let artifact = ArtifactRef {
        filename: params.filename,
        subfolder: params.subfolder,
        kind: params.kind,
    };
    let fetched = state
        .engine
        .fetch_artifact(&artifact)
        .await
        .map_err(CoreError::from)?;

    let content_type = fetched
        .content_type
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], fetched.bytes))
}
