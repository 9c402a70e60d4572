//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (workflow submission, history, queue,
//! output viewing, interruption, queue deletion, node option listing)
//! using [`reqwest`], and exposes it as an [`ExecutionEngine`].

use async_trait::async_trait;
use comfyremote_core::engine::{
    Artifact, EngineError, ExecutionEngine, HistoryEntry, QueueSnapshot,
};
use comfyremote_core::graph::WorkflowGraph;
use comfyremote_core::job::ArtifactRef;
use comfyremote_core::types::ExecutionId;
use serde::Deserialize;
use serde_json::Value;

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for sharing timeouts and connection pools).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON and
    /// client ID.
    pub async fn submit_workflow(
        &self,
        workflow: &WorkflowGraph,
        client_id: &str,
    ) -> Result<SubmitResponse, EngineError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(self.url("/prompt"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}`. ComfyUI answers `{}` until the
    /// prompt has finished, and `{ "<prompt_id>": {...} }` afterwards.
    pub async fn get_history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, EngineError> {
        let response = self
            .client
            .get(self.url(&format!("/history/{prompt_id}")))
            .send()
            .await
            .map_err(transport_error)?;

        let body: Value = Self::parse_response(response).await?;
        parse_history(&body, prompt_id)
    }

    /// Retrieve the running and pending queues (`GET /queue`).
    pub async fn get_queue(&self) -> Result<QueueSnapshot, EngineError> {
        let response = self
            .client
            .get(self.url("/queue"))
            .send()
            .await
            .map_err(transport_error)?;

        let body: Value = Self::parse_response(response).await?;
        Ok(parse_queue(&body))
    }

    /// Download an output file (`GET /view`).
    pub async fn view(&self, artifact: &ArtifactRef) -> Result<Artifact, EngineError> {
        let response = self
            .client
            .get(self.url("/view"))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let response = Self::ensure_success(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(transport_error)?;

        Ok(Artifact {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Interrupt the currently running execution immediately.
    ///
    /// Sends a `POST /interrupt` request.  This does not target a
    /// specific prompt -- it interrupts whatever is executing right now.
    pub async fn interrupt(&self) -> Result<(), EngineError> {
        let response = self
            .client
            .post(self.url("/interrupt"))
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_status(response).await
    }

    /// Cancel a queued execution.
    ///
    /// Sends a `POST /queue` request asking ComfyUI to delete the
    /// specified prompt from the queue.
    pub async fn cancel_execution(&self, prompt_id: &str) -> Result<(), EngineError> {
        let body = serde_json::json!({
            "delete": [prompt_id],
        });

        let response = self
            .client
            .post(self.url("/queue"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_status(response).await
    }

    /// List the options ComfyUI offers for one input of a node class
    /// (`GET /object_info/{node_class}`).
    pub async fn node_input_options(
        &self,
        node_class: &str,
        input_name: &str,
    ) -> Result<Vec<String>, EngineError> {
        let response = self
            .client
            .get(self.url(&format!("/object_info/{node_class}")))
            .send()
            .await
            .map_err(transport_error)?;

        let body: Value = Self::parse_response(response).await?;
        Ok(parse_input_options(&body, node_class, input_name))
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`EngineError::Rejected`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::Malformed(e.to_string()))
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), EngineError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionEngine for ComfyUIApi {
    async fn submit(
        &self,
        graph: &WorkflowGraph,
        client_id: &str,
    ) -> Result<ExecutionId, EngineError> {
        let response = self.submit_workflow(graph, client_id).await?;
        tracing::debug!(
            prompt_id = %response.prompt_id,
            queue_position = response.number,
            "Workflow queued on ComfyUI",
        );
        Ok(response.prompt_id)
    }

    async fn history(&self, execution_id: &str) -> Result<Option<HistoryEntry>, EngineError> {
        self.get_history(execution_id).await
    }

    async fn queue(&self) -> Result<QueueSnapshot, EngineError> {
        self.get_queue().await
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Artifact, EngineError> {
        self.view(artifact).await
    }

    async fn interrupt(&self) -> Result<(), EngineError> {
        ComfyUIApi::interrupt(self).await
    }

    async fn cancel(&self, execution_id: &str) -> Result<(), EngineError> {
        self.cancel_execution(execution_id).await
    }

    async fn list_models(
        &self,
        node_class: &str,
        input_name: &str,
    ) -> Result<Vec<String>, EngineError> {
        self.node_input_options(node_class, input_name).await
    }
}

fn transport_error(err: reqwest::Error) -> EngineError {
    EngineError::Unavailable(err.to_string())
}

/// Extract the entry for `prompt_id` from a `/history/{id}` body.
pub fn parse_history(body: &Value, prompt_id: &str) -> Result<Option<HistoryEntry>, EngineError> {
    match body.get(prompt_id) {
        None | Some(Value::Null) => Ok(None),
        Some(entry) => serde_json::from_value(entry.clone())
            .map(Some)
            .map_err(|e| EngineError::Malformed(format!("history entry for {prompt_id}: {e}"))),
    }
}

/// Extract prompt ids from a `/queue` body.
///
/// Each queue item is a tuple `[number, prompt_id, prompt, extra_data,
/// outputs_to_execute]`; malformed items are skipped.
pub fn parse_queue(body: &Value) -> QueueSnapshot {
    let ids = |key: &str| -> Vec<ExecutionId> {
        body.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(1).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    QueueSnapshot {
        running: ids("queue_running"),
        pending: ids("queue_pending"),
    }
}

/// Extract combo options from an `/object_info/{class}` body.
///
/// Options live at `<class>.input.{required,optional}.<input>[0]`.
pub fn parse_input_options(body: &Value, node_class: &str, input_name: &str) -> Vec<String> {
    let inputs = body.get(node_class).and_then(|c| c.get("input"));
    ["required", "optional"]
        .iter()
        .filter_map(|section| inputs?.get(section)?.get(input_name)?.get(0)?.as_array())
        .next()
        .map(|options| {
            options
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
