//! Resumable chunked uploads.
//!
//! The [`ChunkTransferEngine`] moves single chunks; the
//! [`UploadSessionManager`] negotiates sessions with the remote service,
//! persists them through a [`SessionStore`] after every acknowledged chunk,
//! and drives the engine across whatever chunks are still missing.

mod chunked;
mod engine;
mod manager;
#[cfg(test)]
mod mock;
mod progress;
mod session;
mod store;
mod transport;
mod validation;

use std::time::Duration;

use fanvault_protocol::UploadId;

pub use chunked::{Chunk, ChunkReader, calculate_file_checksum, checksum_bytes, chunk_bounds};
pub use engine::ChunkTransferEngine;
pub use manager::{CompletionResult, SessionConfig, UploadSessionManager};
pub use progress::{ThroughputEstimator, TransferProgress};
pub use session::UploadSession;
pub use store::{JsonFileSessionStore, MemorySessionStore, SessionStore};
pub use transport::{TransportFuture, UploadTransport};
pub use validation::validate_file_name;

/// Default chunk size: 4 MiB.
///
/// The server may negotiate a smaller size; it is never allowed to grow past
/// the configured value.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("chunk {index} rejected: {reason}")]
    ChunkRejected { index: u32, reason: String },

    #[error("checksum mismatch on chunk {index}")]
    ChecksumMismatch { index: u32 },

    #[error("session not found: {0}")]
    SessionNotFound(UploadId),

    #[error("session {upload_id} incomplete: {uploaded}/{total} chunks uploaded")]
    IncompleteSession {
        upload_id: UploadId,
        uploaded: usize,
        total: u32,
    },

    #[error("file size changed: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("upload rejected by server: {0}")]
    Rejected(String),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid file name: {0}")]
    InvalidPath(String),
}

impl TransferError {
    /// Whether re-invoking the failed operation may succeed.
    ///
    /// Network trouble and per-chunk rejections are transient; local misuse,
    /// server rejections and changed source files are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::Transport(_)
                | TransferError::Timeout(_)
                | TransferError::ChunkRejected { .. }
                | TransferError::ChecksumMismatch { .. }
                | TransferError::SessionNotFound(_)
        )
    }
}
