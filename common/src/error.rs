use thiserror::Error;

// Core internal errors. None of these escape the retrieval entry point; the
// orchestrator folds them into empty contributions.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Search error: {0}")]
    Search(String),
    #[error("Threshold error: {0}")]
    Threshold(String),
    #[error("Recency weighting error: {0}")]
    Recency(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
