//! Route definitions for the `/workflows` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::workflows;
use crate::state::AppState;

/// Routes mounted at `/workflows`.
///
/// ```text
/// GET    /                   -> list_workflows
/// GET    /{name}             -> get_workflow
/// GET    /{name}/introspect  -> introspect_workflow
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(workflows::list_workflows))
        .route("/{name}", get(workflows::get_workflow))
        .route("/{name}/introspect", get(workflows::introspect_workflow))
}
