use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to read source {path:?}: {reason}")]
    SourceRead { path: PathBuf, reason: String },

    #[error("Merge service transport error: {0}")]
    Transport(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Malformed merge result: {0}")]
    MalformedResult(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl MergeError {
    /// Failures expected from the merge service round trip. Anything else
    /// reaching the orchestrator still falls back, but is logged as an error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MergeError::Transport(_) | MergeError::Extraction(_) | MergeError::MalformedResult(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
