//! Model listings sourced from ComfyUI node definitions.

use axum::extract::State;
use axum::Json;
use comfyremote_core::error::CoreError;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

const CHECKPOINT_LOADER: (&str, &str) = ("CheckpointLoaderSimple", "ckpt_name");
const LORA_LOADER: (&str, &str) = ("LoraLoader", "lora_name");

/// GET /api/v1/models/checkpoints
pub async fn list_checkpoints(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<String>>>> {
    list_options(&state, CHECKPOINT_LOADER).await
}

/// GET /api/v1/models/loras
pub async fn list_loras(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<String>>>> {
    list_options(&state, LORA_LOADER).await
}

async fn list_options(
    state: &AppState,
    (node_class, input_name): (&str, &str),
) -> AppResult<Json<DataResponse<Vec<String>>>> {
    let names = state
        .engine
        .list_models(node_class, input_name)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(DataResponse { data: names }))
}
