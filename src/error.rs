use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Workflow submission failed: {0}")]
    Submission(#[source] Box<AppError>),

    #[error("Engine returned {status}: {body}")]
    Engine { status: u16, body: String },

    #[error("Gave up on workflow {id} after {attempts} consecutive failed status queries")]
    QueryRetriesExhausted { id: String, attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
