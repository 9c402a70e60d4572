//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// `?limit=` for history listings. Clamped to the history capacity by
/// the handler.
#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

/// Artifact coordinates for `GET /engine/view`.
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_view_type")]
    pub kind: String,
}

fn default_view_type() -> String {
    "output".to_string()
}
