#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unsupported workflow format: {0}")]
    UnsupportedFormat(String),

    #[error("Execution engine unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Execution engine rejected the request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
