pub mod engine;
pub mod health;
pub mod jobs;
pub mod models;
pub mod runs;
pub mod workflows;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workflows                                       list
/// /workflows/{name}                                raw document
/// /workflows/{name}/introspect                     configurable inputs
///
/// /runs                                            submit (POST)
///
/// /jobs                                            history (?limit=)
/// /jobs/{id}                                       get
/// /jobs/{id}/stop                                  stop (POST)
///
/// /engine/queue                                    ComfyUI queue snapshot
/// /engine/view                                     proxied output file
///
/// /models/checkpoints                              checkpoint names
/// /models/loras                                    LoRA names
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/workflows", workflows::router())
        .nest("/runs", runs::router())
        .nest("/jobs", jobs::router())
        .nest("/engine", engine::router())
        .nest("/models", models::router())
}
