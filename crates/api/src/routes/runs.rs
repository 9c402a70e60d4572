use axum::routing::post;
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/runs`.
///
/// ```text
/// POST   /    -> create_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(runs::create_run))
}
