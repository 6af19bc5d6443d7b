use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of one upload.
///
/// `pending → preparing → uploading → processing → completed`, with
/// `failed` and `cancelled` reachable from any non-terminal status and
/// `failed → pending` on manual retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    Pending,
    Preparing,
    Uploading,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    /// No further automatic progress happens from this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }

    /// Counts against the concurrency limit.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            UploadStatus::Preparing | UploadStatus::Uploading | UploadStatus::Processing
        )
    }

    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        use UploadStatus::*;

        match (self, next) {
            (Pending, Preparing) | (Preparing, Uploading) | (Uploading, Processing) => true,
            (Processing, Completed) => true,
            // A re-attempt after a transient failure starts over from session setup.
            (Uploading | Processing, Preparing) => true,
            (Failed, Pending) => true,
            (from, Failed | Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Preparing => "preparing",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
            UploadStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
