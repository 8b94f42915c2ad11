use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ExternalError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ExternalError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type ExternalResult<T> = Result<T, ExternalError>;
