//! Handlers for the `/workflows` resource.

use axum::extract::{Path, State};
use axum::Json;
use comfyremote_core::introspection::{introspect_document, WorkflowIntrospection};
use comfyremote_core::workflow_store::WorkflowSummary;
use serde_json::Value;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/workflows
///
/// List stored workflows, sorted by name.
pub async fn list_workflows(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<WorkflowSummary>>>> {
    let workflows = state.workflows.list().await?;
    Ok(Json(DataResponse { data: workflows }))
}

/// GET /api/v1/workflows/{name}
///
/// Return the raw workflow document, in whichever format it is stored.
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<Value>>> {
    let document = state.workflows.load(&name).await?;
    Ok(Json(DataResponse {
        data: document.to_value(),
    }))
}

/// GET /api/v1/workflows/{name}/introspect
///
/// Describe the configurable inputs of every node. List-structured
/// workflows are rejected with 422.
pub async fn introspect_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<WorkflowIntrospection>>> {
    let document = state.workflows.load(&name).await?;
    let nodes = introspect_document(&document)?;

    tracing::debug!(workflow = %name, nodes = nodes.len(), "Workflow introspected");

    Ok(Json(DataResponse {
        data: WorkflowIntrospection { nodes },
    }))
}
