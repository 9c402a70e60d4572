use axum::routing::get;
use axum::Router;

use crate::handlers::engine;
use crate::state::AppState;

/// Routes mounted at `/engine`.
///
/// ```text
/// GET    /queue    -> get_queue
/// GET    /view     -> view_artifact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(engine::get_queue))
        .route("/view", get(engine::view_artifact))
}
