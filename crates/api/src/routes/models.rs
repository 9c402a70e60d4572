use axum::routing::get;
use axum::Router;

use crate::handlers::models;
use crate::state::AppState;

/// Routes mounted at `/models`.
///
/// ```text
/// GET    /checkpoints    -> list_checkpoints
/// GET    /loras          -> list_loras
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkpoints", get(models::list_checkpoints))
        .route("/loras", get(models::list_loras))
}
