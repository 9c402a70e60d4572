//! Integration tests for run submission and `/api/v1/jobs`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use common::{basic_workflow, body_json, get, post_empty, post_json, write_workflow, FakeEngine};
use comfyremote_core::engine::{HistoryEntry, QueueSnapshot};
use serde_json::{json, Value};

fn finished_entry(filename: &str) -> HistoryEntry {
    serde_json::from_value(json!({
        "outputs": {
            "9": { "images": [ { "filename": filename, "subfolder": "", "type": "output" } ] }
        },
        "status": { "status_str": "success", "completed": true }
    }))
    .unwrap()
}

/// Poll `GET /jobs/{id}` until the job reaches a terminal status.
async fn wait_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..500 {
        let job = body_json(get(app.clone(), &format!("/api/v1/jobs/{job_id}")).await).await;
        let status = job["data"]["status"].as_str().unwrap().to_string();
        if !matches!(status.as_str(), "queued" | "running") {
            return job["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never finished");
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_with_fixed_seed_and_override_submits_resolved_graph() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let engine = Arc::new(FakeEngine::default());
    let app = common::build_test_app(Arc::clone(&engine), dir.path());

    let response = post_json(
        app,
        "/api/v1/runs",
        json!({
            "workflow_name": "basic",
            "inputs": { "3.steps": 30, "6.text": "a dog", "99.bogus": 1 },
            "seed_control": { "mode": "fixed", "value": 7 }
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let job = body_json(response).await["data"].clone();
    assert_eq!(job["job_id"], "prompt-1");
    assert_eq!(job["workflow_name"], "basic");
    assert_eq!(job["status"], "queued");
    assert_eq!(job["resolved_seed"], 7);
    assert_eq!(job["resolved_inputs"], json!({ "3.steps": 30, "6.text": "a dog" }));
    assert!(job["image_url"].is_null());

    let submitted = engine.submitted.lock().unwrap();
    let graph = &submitted[0];
    assert_eq!(graph.input("3", "steps"), Some(&json!(30)));
    assert_eq!(graph.input("3", "seed"), Some(&json!(7)));
    assert_eq!(graph.input("6", "text"), Some(&json!("a dog")));
    assert_eq!(graph.input("3", "model"), Some(&json!(["4", 0])));
    assert!(graph.node("99").is_none());
}

#[tokio::test]
async fn run_without_seed_control_uses_random_seed() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let engine = Arc::new(FakeEngine::default());
    let app = common::build_test_app(Arc::clone(&engine), dir.path());

    let response = post_json(app, "/api/v1/runs", json!({ "workflow_name": "basic" })).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let job = body_json(response).await["data"].clone();
    let seed = job["resolved_seed"].as_u64().unwrap();
    assert!(seed >= 1);

    let submitted = engine.submitted.lock().unwrap();
    assert_eq!(submitted[0].input("3", "seed"), Some(&json!(seed)));
}

#[tokio::test]
async fn run_missing_workflow_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let app = common::build_test_app(Arc::clone(&engine), dir.path());

    let response = post_json(app, "/api/v1/runs", json!({ "workflow_name": "nope" })).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(engine.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_empty_workflow_name_returns_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(Arc::new(FakeEngine::default()), dir.path());

    let response = post_json(app, "/api/v1/runs", json!({ "workflow_name": " " })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn run_list_format_workflow_returns_422() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "ui", &json!([ { "id": 3, "type": "KSampler" } ]));
    let engine = Arc::new(FakeEngine::default());
    let app = common::build_test_app(Arc::clone(&engine), dir.path());

    let response = post_json(app, "/api/v1/runs", json!({ "workflow_name": "ui" })).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(engine.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_with_unreachable_engine_returns_503_and_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let app = common::build_test_app(Arc::new(FakeEngine::unavailable()), dir.path());

    let response = post_json(app.clone(), "/api/v1/runs", json!({ "workflow_name": "basic" })).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let jobs = body_json(get(app, "/api/v1/jobs").await).await;
    assert_eq!(jobs["data"], json!([]));
}

// ---------------------------------------------------------------------------
// Job lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_job_exposes_image_url() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let engine = Arc::new(FakeEngine::default());
    engine
        .replies
        .lock()
        .unwrap()
        .push_back(finished_entry("ComfyUI_00001_.png"));
    let app = common::build_test_app(Arc::clone(&engine), dir.path());

    let created = post_json(app.clone(), "/api/v1/runs", json!({ "workflow_name": "basic" })).await;
    let job_id = body_json(created).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    let job = wait_terminal(&app, &job_id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["artifact"]["filename"], "ComfyUI_00001_.png");
    assert_eq!(
        job["image_url"],
        "/api/v1/engine/view?filename=ComfyUI_00001_.png&subfolder=&type=output"
    );
    assert!(job["finished_at"].is_string());
}

#[tokio::test]
async fn list_jobs_is_most_recent_first_and_limited() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let app = common::build_test_app(Arc::new(FakeEngine::default()), dir.path());

    for _ in 0..3 {
        let response =
            post_json(app.clone(), "/api/v1/runs", json!({ "workflow_name": "basic" })).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let all = body_json(get(app.clone(), "/api/v1/jobs").await).await;
    let ids: Vec<_> = all["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["job_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["prompt-3", "prompt-2", "prompt-1"]);

    let limited = body_json(get(app, "/api/v1/jobs?limit=1").await).await;
    assert_eq!(limited["data"].as_array().unwrap().len(), 1);
    assert_eq!(limited["data"][0]["job_id"], "prompt-3");
}

#[tokio::test]
async fn list_jobs_is_capped_at_configured_capacity() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let config = common::ServerConfig {
        job_history_capacity: 2,
        ..common::test_config(dir.path())
    };
    let app = common::build_test_app_with_config(Arc::new(FakeEngine::default()), config);

    for _ in 0..3 {
        post_json(app.clone(), "/api/v1/runs", json!({ "workflow_name": "basic" })).await;
    }

    let listed = body_json(get(app, "/api/v1/jobs?limit=100").await).await;
    let ids: Vec<_> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["job_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["prompt-3", "prompt-2"]);
}

#[tokio::test]
async fn get_unknown_job_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(Arc::new(FakeEngine::default()), dir.path());

    let response = get(app, "/api/v1/jobs/prompt-404").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stop_pending_job_cancels_it() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let engine = Arc::new(FakeEngine::default());
    *engine.queue.lock().unwrap() = QueueSnapshot {
        running: vec![],
        pending: vec!["prompt-1".to_string()],
    };
    let app = common::build_test_app(Arc::clone(&engine), dir.path());

    post_json(app.clone(), "/api/v1/runs", json!({ "workflow_name": "basic" })).await;

    let response = post_empty(app.clone(), "/api/v1/jobs/prompt-1/stop").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "cancelled");
    assert_eq!(*engine.cancelled.lock().unwrap(), vec!["prompt-1".to_string()]);

    let again = post_empty(app, "/api/v1/jobs/prompt-1/stop").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stop_job_finished_on_engine_returns_409_and_keeps_image() {
    let dir = tempfile::tempdir().unwrap();
    write_workflow(dir.path(), "basic", &basic_workflow());
    let engine = Arc::new(FakeEngine::default());
    engine.replies.lock().unwrap().push_back(finished_entry("done.png"));
    let mut config = common::test_config(dir.path());
    config.poll.initial_interval = Duration::from_secs(60);
    config.poll.max_interval = Duration::from_secs(60);
    let app = common::build_test_app_with_config(Arc::clone(&engine), config);

    post_json(app.clone(), "/api/v1/runs", json!({ "workflow_name": "basic" })).await;

    let response = post_empty(app.clone(), "/api/v1/jobs/prompt-1/stop").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let job = body_json(get(app, "/api/v1/jobs/prompt-1").await).await;
    assert_eq!(job["data"]["status"], "completed");
    assert_eq!(job["data"]["artifact"]["filename"], "done.png");
}
