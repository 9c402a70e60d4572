//! Execution engine collaborator.
//!
//! The engine (a ComfyUI server) is reached only through the narrow
//! [`ExecutionEngine`] trait so the job tracker and HTTP layer can run
//! against any implementation, including in-process fakes in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::graph::WorkflowGraph;
use crate::job::ArtifactRef;
use crate::types::{ExecutionId, NodeId};

/// Status string the engine reports for a failed execution.
pub const HISTORY_STATUS_ERROR: &str = "error";

/// Status message kind carrying the exception of a failed execution.
const EXECUTION_ERROR_MESSAGE: &str = "execution_error";

/// Errors from an engine call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be reached (connect, DNS, timeout, reset).
    #[error("engine unreachable: {0}")]
    Unavailable(String),

    /// The engine answered with a non-success status.
    #[error("engine returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The engine answered successfully but the body could not be decoded.
    #[error("malformed engine response: {0}")]
    Malformed(String),
}

impl EngineError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => CoreError::UpstreamUnavailable(msg),
            EngineError::Rejected { status, body } => CoreError::UpstreamRejected {
                status,
                message: body,
            },
            EngineError::Malformed(msg) => {
                CoreError::Internal(format!("malformed engine response: {msg}"))
            }
        }
    }
}

/// Outputs recorded for one node of a finished execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactRef>,
}

/// Execution status block of a history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: String,
    #[serde(default)]
    pub completed: bool,
    /// `[kind, payload]` pairs logged during execution.
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// History of one finished execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Outputs by node id, iterated in id order.
    #[serde(default)]
    pub outputs: BTreeMap<NodeId, NodeOutput>,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

impl HistoryEntry {
    /// The first image of the first node (in id order) that produced any.
    pub fn first_image(&self) -> Option<&ArtifactRef> {
        self.outputs
            .values()
            .find_map(|output| output.images.first())
    }

    /// Whether the engine recorded this execution as failed.
    pub fn is_error(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.status_str == HISTORY_STATUS_ERROR)
    }

    /// Human-readable failure reason for an errored execution.
    pub fn error_message(&self) -> String {
        let logged = self.status.as_ref().and_then(|status| {
            status.messages.iter().find_map(|message| {
                if message.get(0)?.as_str()? != EXECUTION_ERROR_MESSAGE {
                    return None;
                }
                let payload = message.get(1)?;
                let text = payload.get("exception_message")?.as_str()?.trim();
                Some(match payload.get("node_type").and_then(Value::as_str) {
                    Some(node_type) => format!("{node_type}: {text}"),
                    None => text.to_string(),
                })
            })
        });
        logged.unwrap_or_else(|| "Execution failed on the engine".to_string())
    }
}

/// Engine queue contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub running: Vec<ExecutionId>,
    pub pending: Vec<ExecutionId>,
}

impl QueueSnapshot {
    pub fn is_running(&self, execution_id: &str) -> bool {
        self.running.iter().any(|id| id == execution_id)
    }

    pub fn is_pending(&self, execution_id: &str) -> bool {
        self.pending.iter().any(|id| id == execution_id)
    }
}

/// Raw artifact bytes fetched from the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Narrow request/response interface to the execution engine.
///
/// Every call is independently fallible.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Queue a graph for execution; returns the engine's execution id.
    async fn submit(
        &self,
        graph: &WorkflowGraph,
        client_id: &str,
    ) -> Result<ExecutionId, EngineError>;

    /// History for an execution, `None` until it has finished.
    async fn history(&self, execution_id: &str) -> Result<Option<HistoryEntry>, EngineError>;

    /// Running and pending execution ids.
    async fn queue(&self) -> Result<QueueSnapshot, EngineError>;

    /// Fetch an output file.
    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Artifact, EngineError>;

    /// Interrupt whatever is currently executing.
    async fn interrupt(&self) -> Result<(), EngineError>;

    /// Remove a pending execution from the queue.
    async fn cancel(&self, execution_id: &str) -> Result<(), EngineError>;

    /// Option values the engine offers for `node_class.input_name`
    /// (e.g. checkpoint file names).
    async fn list_models(
        &self,
        node_class: &str,
        input_name: &str,
    ) -> Result<Vec<String>, EngineError>;
}
