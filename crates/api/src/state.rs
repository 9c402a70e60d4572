use std::sync::Arc;

use comfyremote_comfyui::tracker::JobTracker;
use comfyremote_core::engine::ExecutionEngine;
use comfyremote_core::workflow_store::WorkflowStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Stored workflows.
    pub workflows: Arc<dyn WorkflowStore>,
    /// ComfyUI client, used directly for queue, artifact and model queries.
    pub engine: Arc<dyn ExecutionEngine>,
    /// Submitted jobs and their pollers.
    pub tracker: Arc<JobTracker>,
}
