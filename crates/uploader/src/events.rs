use std::time::Duration;

use fanvault_protocol::UploadId;
use fanvault_upload_queue::{Transition, TransitionKind, UploadProgress, UploadStatus};

/// Observable change to an upload, fanned out to every subscriber.
///
/// Each variant carries the item as it was right after the change.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Queued(UploadProgress),
    /// Lifecycle step that is neither terminal nor a retry.
    StatusChanged {
        from: UploadStatus,
        item: UploadProgress,
    },
    Progress(UploadProgress),
    /// An attempt failed and another one starts after `delay`.
    Retrying {
        item: UploadProgress,
        delay: Duration,
    },
    Completed {
        item: UploadProgress,
        content_id: Option<String>,
    },
    Failed(UploadProgress),
    Cancelled(UploadProgress),
    Dismissed(UploadProgress),
}

impl UploadEvent {
    /// Event for an accepted transition. Retries and completions carry
    /// extra data and are built by the orchestrator.
    pub(crate) fn from_transition(t: Transition) -> Self {
        match (t.kind, t.from) {
            (TransitionKind::Enqueued, _) | (_, None) => UploadEvent::Queued(t.item),
            (TransitionKind::Progress, _) => UploadEvent::Progress(t.item),
            (TransitionKind::Failed, _) => UploadEvent::Failed(t.item),
            (TransitionKind::Cancelled, _) => UploadEvent::Cancelled(t.item),
            (TransitionKind::Dismissed, _) => UploadEvent::Dismissed(t.item),
            (TransitionKind::Completed, _) => UploadEvent::Completed {
                item: t.item,
                content_id: None,
            },
            (TransitionKind::Retrying, _) => UploadEvent::Retrying {
                item: t.item,
                delay: Duration::ZERO,
            },
            (_, Some(from)) => UploadEvent::StatusChanged { from, item: t.item },
        }
    }

    pub fn item(&self) -> &UploadProgress {
        match self {
            UploadEvent::Queued(item)
            | UploadEvent::StatusChanged { item, .. }
            | UploadEvent::Progress(item)
            | UploadEvent::Retrying { item, .. }
            | UploadEvent::Completed { item, .. }
            | UploadEvent::Failed(item)
            | UploadEvent::Cancelled(item)
            | UploadEvent::Dismissed(item) => item,
        }
    }

    pub fn upload_id(&self) -> UploadId {
        self.item().upload_id
    }

    /// Whether the upload has left the queue or stopped for good.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            UploadEvent::Completed { .. }
                | UploadEvent::Failed(_)
                | UploadEvent::Cancelled(_)
                | UploadEvent::Dismissed(_)
        )
    }
}
