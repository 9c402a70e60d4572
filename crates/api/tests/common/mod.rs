#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use comfyremote_api::config::ServerConfig;
use comfyremote_api::routes;
use comfyremote_api::state::AppState;
use comfyremote_api::VIEW_PATH;
use comfyremote_comfyui::backoff::PollConfig;
use comfyremote_comfyui::tracker::JobTracker;
use comfyremote_core::engine::{
    Artifact, EngineError, ExecutionEngine, HistoryEntry, QueueSnapshot,
};
use comfyremote_core::graph::WorkflowGraph;
use comfyremote_core::job::ArtifactRef;
use comfyremote_core::types::ExecutionId;
use comfyremote_core::workflow_store::DirectoryWorkflowStore;

/// In-process ComfyUI double.
///
/// Every submitted graph is recorded. History replies are consumed in
/// order; once exhausted, history answers "not finished yet".
#[derive(Default)]
pub struct FakeEngine {
    pub unavailable: bool,
    pub submitted: Mutex<Vec<WorkflowGraph>>,
    pub replies: Mutex<VecDeque<HistoryEntry>>,
    pub queue: Mutex<QueueSnapshot>,
    pub cancelled: Mutex<Vec<String>>,
    pub models: Vec<String>,
}

impl FakeEngine {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.unavailable {
            return Err(EngineError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionEngine for FakeEngine {
    async fn submit(&self, graph: &WorkflowGraph, _: &str) -> Result<ExecutionId, EngineError> {
        self.check()?;
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(graph.clone());
        Ok(format!("prompt-{}", submitted.len()))
    }

    async fn history(&self, _: &str) -> Result<Option<HistoryEntry>, EngineError> {
        self.check()?;
        Ok(self.replies.lock().unwrap().pop_front())
    }

    async fn queue(&self) -> Result<QueueSnapshot, EngineError> {
        self.check()?;
        Ok(self.queue.lock().unwrap().clone())
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Artifact, EngineError> {
        self.check()?;
        if artifact.filename == "missing.png" {
            return Err(EngineError::Rejected {
                status: 404,
                body: "file not found".into(),
            });
        }
        Ok(Artifact {
            bytes: format!("{}/{}", artifact.subfolder, artifact.filename).into_bytes(),
            content_type: Some("image/png".into()),
        })
    }

    async fn interrupt(&self) -> Result<(), EngineError> {
        self.check()
    }

    async fn cancel(&self, execution_id: &str) -> Result<(), EngineError> {
        self.check()?;
        self.cancelled.lock().unwrap().push(execution_id.to_string());
        Ok(())
    }

    async fn list_models(&self, node_class: &str, _: &str) -> Result<Vec<String>, EngineError> {
        self.check()?;
        Ok(self
            .models
            .iter()
            .map(|m| format!("{node_class}/{m}"))
            .collect())
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(workflow_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        comfyui_url: "http://127.0.0.1:8188".to_string(),
        workflow_dir: workflow_dir.to_path_buf(),
        job_history_capacity: 50,
        poll: fast_poll(),
    }
}

/// Millisecond-scale polling so background jobs settle quickly.
pub fn fast_poll() -> PollConfig {
    PollConfig {
        initial_interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
        multiplier: 2.0,
        max_attempts: 1_000,
        deadline: Duration::from_secs(10),
        max_consecutive_errors: 3,
    }
}

/// Build the full application router with all middleware layers, backed
/// by `engine` and the workflows stored in `workflow_dir`.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub fn build_test_app(engine: Arc<FakeEngine>, workflow_dir: &Path) -> Router {
    build_test_app_with_config(engine, test_config(workflow_dir))
}

/// Same as [`build_test_app`], with an explicit configuration.
pub fn build_test_app_with_config(engine: Arc<FakeEngine>, config: ServerConfig) -> Router {
    let tracker = Arc::new(JobTracker::new(
        engine.clone(),
        config.job_history_capacity,
        config.poll.clone(),
        VIEW_PATH,
    ));

    let request_timeout_secs = config.request_timeout_secs;

    let state = AppState {
        workflows: Arc::new(DirectoryWorkflowStore::new(config.workflow_dir.clone())),
        config: Arc::new(config),
        engine,
        tracker,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, ACCEPT])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Write a workflow file into `dir`.
pub fn write_workflow(dir: &Path, name: &str, document: &serde_json::Value) {
    std::fs::write(dir.join(format!("{name}.json")), document.to_string()).unwrap();
}

/// A minimal text-to-image workflow in API format.
pub fn basic_workflow() -> serde_json::Value {
    serde_json::json!({
        "3": {
            "class_type": "KSampler",
            "_meta": { "title": "Sampler" },
            "inputs": {
                "seed": 0,
                "steps": 20,
                "cfg": 7.0,
                "sampler_name": "euler",
                "model": ["4", 0]
            }
        },
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": "sd15.safetensors" }
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": "a cat", "clip": ["4", 1] }
        }
    })
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
