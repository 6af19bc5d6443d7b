//! Local persistence for content drafts, upload history and statistics.

mod autosave;
mod draft;
mod history;
mod stats;
mod store;

use fanvault_protocol::UploadId;

pub use autosave::DraftAutosaver;
pub use draft::{ContentDraft, ProcessingOptions, VideoQuality};
pub use history::{HistoryStatus, UploadHistoryItem};
pub use stats::{CategoryStats, DEFAULT_STORAGE_QUOTA, UploadStatistics};
pub use store::Library;

/// Errors produced by the library crate.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no completed upload {0} in history")]
    HistoryNotFound(UploadId),

    #[error("draft autosaver has stopped")]
    AutosaverStopped,
}
