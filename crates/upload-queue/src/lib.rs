//! State of every live upload as a pure reducer.
//!
//! [`UploadQueue::apply`] is the only way to change state. It performs no
//! I/O; the orchestration layer dispatches [`UploadAction`]s built from the
//! results of network and disk operations and reacts to the returned
//! [`Transition`].

mod item;
mod queue;
mod status;

use fanvault_protocol::UploadId;

pub use item::{Priority, UploadProgress, UploadQueueItem};
pub use queue::{Transition, TransitionKind, UploadAction, UploadQueue};
pub use status::UploadStatus;

/// Reasons an action is rejected. A rejected action leaves the queue
/// unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    #[error("unknown upload: {0}")]
    UnknownUpload(UploadId),

    #[error("upload already queued: {0}")]
    DuplicateUpload(UploadId),

    #[error("cannot {action} upload {upload_id} while {from}")]
    InvalidTransition {
        upload_id: UploadId,
        from: UploadStatus,
        action: &'static str,
    },

    #[error("concurrency limit of {limit} active uploads reached")]
    AdmissionLimit { limit: usize },

    #[error("upload {upload_id} reached the retry limit of {max_retries}")]
    RetryLimit { upload_id: UploadId, max_retries: u32 },
}
