use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Remote source {url} is unreachable: {reason}")]
    UpstreamUnreachable { url: String, reason: String },

    #[error("Transfer of {filename} from {url} failed: {reason}")]
    TransferFailed {
        filename: String,
        url: String,
        reason: String,
    },

    #[error("No download registered under {filename}")]
    NotFound { filename: String },

    #[error("Storage directory creation failed at {path}: {reason}")]
    StorageDirectoryCreation { path: PathBuf, reason: String },

    #[error("Initialization lock at {path} could not be opened: {reason}")]
    InitLock { path: PathBuf, reason: String },

    #[error("CLI argument validation failed: {details}")]
    CliArgumentValidation { details: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] eyre::Report),
}

impl FetchCacheError {
    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}
