//! Uploader error types.

use fanvault_library::LibraryError;
use fanvault_transfer::TransferError;
use fanvault_upload_queue::QueueError;
use uuid::Uuid;

use crate::validation::ValidationReport;

/// Errors produced by the uploader.
#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    #[error("invalid upload: {0}")]
    Validation(ValidationReport),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("library error: {0}")]
    Library(#[from] LibraryError),

    #[error("draft not found: {0}")]
    DraftNotFound(Uuid),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration value: {0}")]
    InvalidConfig(String),

    #[error("cannot write configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid auth token")]
    InvalidToken,

    #[error("uploader has stopped")]
    Stopped,
}
