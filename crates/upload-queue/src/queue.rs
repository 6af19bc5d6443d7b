use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use fanvault_protocol::UploadId;

use crate::QueueError;
use crate::item::{UploadProgress, UploadQueueItem};
use crate::status::UploadStatus;

/// Events dispatched into [`UploadQueue::apply`].
///
/// Timestamps are carried by the action so the reducer never reads a clock.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadAction {
    Enqueue {
        item: UploadQueueItem,
    },
    /// `pending → preparing`, only while under the concurrency limit.
    Admit {
        upload_id: UploadId,
        at: DateTime<Utc>,
    },
    /// `preparing → uploading`; `uploaded_bytes` is the coverage of the
    /// new or resumed session.
    SessionReady {
        upload_id: UploadId,
        uploaded_bytes: u64,
    },
    Progress {
        upload_id: UploadId,
        uploaded_bytes: u64,
        bytes_per_second: Option<f64>,
        eta: Option<Duration>,
    },
    /// `uploading → processing`.
    TransferFinished {
        upload_id: UploadId,
    },
    /// `processing → completed`; the item leaves the queue.
    Completed {
        upload_id: UploadId,
        at: DateTime<Utc>,
    },
    AttemptFailed {
        upload_id: UploadId,
        error: String,
        retryable: bool,
    },
    Cancel {
        upload_id: UploadId,
    },
    /// Manual retry of a failed item.
    Retry {
        upload_id: UploadId,
    },
    /// Removes a failed item.
    Dismiss {
        upload_id: UploadId,
    },
}

impl UploadAction {
    pub fn upload_id(&self) -> UploadId {
        match self {
            UploadAction::Enqueue { item } => item.upload_id,
            UploadAction::Admit { upload_id, .. }
            | UploadAction::SessionReady { upload_id, .. }
            | UploadAction::Progress { upload_id, .. }
            | UploadAction::TransferFinished { upload_id }
            | UploadAction::Completed { upload_id, .. }
            | UploadAction::AttemptFailed { upload_id, .. }
            | UploadAction::Cancel { upload_id }
            | UploadAction::Retry { upload_id }
            | UploadAction::Dismiss { upload_id } => *upload_id,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            UploadAction::Enqueue { .. } => "enqueue",
            UploadAction::Admit { .. } => "admit",
            UploadAction::SessionReady { .. } => "session_ready",
            UploadAction::Progress { .. } => "progress",
            UploadAction::TransferFinished { .. } => "transfer_finished",
            UploadAction::Completed { .. } => "completed",
            UploadAction::AttemptFailed { .. } => "attempt_failed",
            UploadAction::Cancel { .. } => "cancel",
            UploadAction::Retry { .. } => "retry",
            UploadAction::Dismiss { .. } => "dismiss",
        }
    }
}

/// What an accepted action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Enqueued,
    Admitted,
    SessionReady,
    Progress,
    TransferFinished,
    Completed,
    /// Attempt failed below the retry limit; the item re-enters `preparing`.
    Retrying,
    Failed,
    Cancelled,
    Requeued,
    Dismissed,
}

/// Result of an accepted action.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub upload_id: UploadId,
    /// `None` for a newly enqueued item.
    pub from: Option<UploadStatus>,
    pub to: UploadStatus,
    pub kind: TransitionKind,
    /// The item after the action. For items that left the queue
    /// (completed, cancelled, dismissed) this is the final state.
    pub item: UploadProgress,
}

/// State of every live upload.
///
/// A pure reducer: [`apply`](Self::apply) validates an action against the
/// current state and either applies it completely or rejects it leaving the
/// state untouched. It performs no I/O.
#[derive(Debug, Clone)]
pub struct UploadQueue {
    items: HashMap<UploadId, UploadQueueItem>,
    /// Every item id, ordered by priority (high first) then insertion.
    order: Vec<UploadId>,
    max_concurrent: usize,
    next_seq: u64,
}

impl UploadQueue {
    /// Creates an empty queue admitting at most `max_concurrent` uploads at
    /// once (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            max_concurrent: max_concurrent.max(1),
            next_seq: 0,
        }
    }

    pub fn apply(&mut self, action: UploadAction) -> Result<Transition, QueueError> {
        let upload_id = action.upload_id();
        let action_name = action.name();

        if let UploadAction::Enqueue { mut item } = action {
            if self.items.contains_key(&upload_id) {
                return Err(QueueError::DuplicateUpload(upload_id));
            }
            item.progress.status = UploadStatus::Pending;
            item.progress.upload_id = upload_id;
            item.seq = self.take_seq();
            let snapshot = item.progress.clone();
            self.insert_ordered(item);
            return Ok(Transition {
                upload_id,
                from: None,
                to: UploadStatus::Pending,
                kind: TransitionKind::Enqueued,
                item: snapshot,
            });
        }

        let from = self
            .items
            .get(&upload_id)
            .map(UploadQueueItem::status)
            .ok_or(QueueError::UnknownUpload(upload_id))?;
        let invalid = || QueueError::InvalidTransition {
            upload_id,
            from,
            action: action_name,
        };
        let can_start = self.can_start_new_upload();

        // Validate before touching the item.
        match &action {
            UploadAction::Enqueue { .. } => unreachable!("handled above"),
            UploadAction::Admit { .. } => {
                if from != UploadStatus::Pending {
                    return Err(invalid());
                }
                if !can_start {
                    return Err(QueueError::AdmissionLimit {
                        limit: self.max_concurrent,
                    });
                }
            }
            UploadAction::SessionReady { .. } if from != UploadStatus::Preparing => {
                return Err(invalid());
            }
            UploadAction::Progress { .. } | UploadAction::TransferFinished { .. }
                if from != UploadStatus::Uploading =>
            {
                return Err(invalid());
            }
            UploadAction::Completed { .. } if from != UploadStatus::Processing => {
                return Err(invalid());
            }
            UploadAction::AttemptFailed { .. } if !from.is_active() => return Err(invalid()),
            UploadAction::Cancel { .. } if !from.can_transition_to(UploadStatus::Cancelled) => {
                return Err(invalid());
            }
            UploadAction::Retry { .. } | UploadAction::Dismiss { .. }
                if from != UploadStatus::Failed =>
            {
                return Err(invalid());
            }
            UploadAction::Retry { .. } => {
                let p = &self.items[&upload_id].progress;
                if p.manual_retries >= p.max_retries {
                    return Err(QueueError::RetryLimit {
                        upload_id,
                        max_retries: p.max_retries,
                    });
                }
            }
            _ => {}
        }

        let (kind, leaves_queue, requeue) = {
            let Some(item) = self.items.get_mut(&upload_id) else {
                return Err(QueueError::UnknownUpload(upload_id));
            };
            let p = &mut item.progress;
            match action {
                UploadAction::Enqueue { .. } => unreachable!("handled above"),
                UploadAction::Admit { at, .. } => {
                    p.status = UploadStatus::Preparing;
                    p.started_at.get_or_insert(at);
                    (TransitionKind::Admitted, false, false)
                }
                UploadAction::SessionReady { uploaded_bytes, .. } => {
                    p.status = UploadStatus::Uploading;
                    p.set_bytes(uploaded_bytes);
                    (TransitionKind::SessionReady, false, false)
                }
                UploadAction::Progress {
                    uploaded_bytes,
                    bytes_per_second,
                    eta,
                    ..
                } => {
                    p.set_bytes(uploaded_bytes.max(p.uploaded_bytes));
                    p.bytes_per_second = bytes_per_second;
                    p.eta = eta;
                    (TransitionKind::Progress, false, false)
                }
                UploadAction::TransferFinished { .. } => {
                    p.status = UploadStatus::Processing;
                    p.set_bytes(p.total_bytes);
                    p.progress = 100.0;
                    p.eta = None;
                    (TransitionKind::TransferFinished, false, false)
                }
                UploadAction::Completed { at, .. } => {
                    p.status = UploadStatus::Completed;
                    p.completed_at = Some(at);
                    p.error = None;
                    (TransitionKind::Completed, true, false)
                }
                UploadAction::AttemptFailed {
                    error, retryable, ..
                } => {
                    p.retry_count = (p.retry_count + 1).min(p.max_retries);
                    p.error = Some(error);
                    p.bytes_per_second = None;
                    p.eta = None;
                    if !retryable || p.retry_count >= p.max_retries {
                        p.status = UploadStatus::Failed;
                        (TransitionKind::Failed, false, false)
                    } else {
                        p.status = UploadStatus::Preparing;
                        (TransitionKind::Retrying, false, false)
                    }
                }
                UploadAction::Cancel { .. } => {
                    p.status = UploadStatus::Cancelled;
                    p.bytes_per_second = None;
                    p.eta = None;
                    (TransitionKind::Cancelled, true, false)
                }
                UploadAction::Retry { .. } => {
                    p.status = UploadStatus::Pending;
                    p.retry_count = 0;
                    p.manual_retries += 1;
                    p.progress = 0.0;
                    p.uploaded_bytes = 0;
                    p.error = None;
                    p.started_at = None;
                    p.completed_at = None;
                    (TransitionKind::Requeued, false, true)
                }
                UploadAction::Dismiss { .. } => (TransitionKind::Dismissed, true, false),
            }
        };

        let item = if leaves_queue {
            self.order.retain(|id| *id != upload_id);
            self.items
                .remove(&upload_id)
                .map(|i| i.progress)
                .ok_or(QueueError::UnknownUpload(upload_id))?
        } else {
            if requeue {
                self.requeue(upload_id);
            }
            self.items[&upload_id].progress.clone()
        };

        Ok(Transition {
            upload_id,
            from: Some(from),
            to: item.status,
            kind,
            item,
        })
    }

    /// Changes the admission limit (minimum 1). Already active uploads are
    /// never preempted.
    pub fn set_max_concurrent(&mut self, limit: usize) -> usize {
        self.max_concurrent = limit.max(1);
        self.max_concurrent
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn active_count(&self) -> usize {
        self.items.values().filter(|i| i.status().is_active()).count()
    }

    pub fn can_start_new_upload(&self) -> bool {
        self.active_count() < self.max_concurrent
    }

    /// The pending item to admit next, if a slot is free.
    pub fn next_admissible(&self) -> Option<UploadId> {
        if !self.can_start_new_upload() {
            return None;
        }
        self.order
            .iter()
            .copied()
            .find(|id| self.items[id].status() == UploadStatus::Pending)
    }

    pub fn pending_ids(&self) -> Vec<UploadId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.items[id].status() == UploadStatus::Pending)
            .collect()
    }

    pub fn get(&self, upload_id: UploadId) -> Option<&UploadProgress> {
        self.items.get(&upload_id).map(|i| &i.progress)
    }

    pub fn item(&self, upload_id: UploadId) -> Option<&UploadQueueItem> {
        self.items.get(&upload_id)
    }

    /// Every item in scheduling order.
    pub fn snapshot(&self) -> Vec<UploadProgress> {
        self.order
            .iter()
            .map(|id| self.items[id].progress.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn sort_key(item: &UploadQueueItem) -> (Reverse<crate::Priority>, u64) {
        (Reverse(item.priority), item.seq)
    }

    fn insert_ordered(&mut self, item: UploadQueueItem) {
        let key = Self::sort_key(&item);
        let pos = self
            .order
            .partition_point(|id| Self::sort_key(&self.items[id]) <= key);
        self.order.insert(pos, item.upload_id);
        self.items.insert(item.upload_id, item);
    }

    /// Moves an item to the back of its priority band.
    fn requeue(&mut self, upload_id: UploadId) {
        self.order.retain(|id| *id != upload_id);
        let seq = self.take_seq();
        if let Some(mut item) = self.items.remove(&upload_id) {
            item.seq = seq;
            self.insert_ordered(item);
        }
    }
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;
    use fanvault_protocol::{ContentMetadata, MediaFile};

    const MB: u64 = 1024 * 1024;

    fn media(size: u64) -> MediaFile {
        MediaFile {
            uri: "/videos/clip.mp4".into(),
            name: "clip.mp4".into(),
            mime_type: "video/mp4".into(),
            size,
            width: None,
            height: None,
            duration: None,
            thumbnail: None,
        }
    }

    fn enqueue(queue: &mut UploadQueue, priority: Priority) -> UploadId {
        let item = UploadQueueItem::new(
            media(10 * MB),
            ContentMetadata::new("Clip"),
            priority,
            3,
            Utc::now(),
        );
        queue.apply(UploadAction::Enqueue { item }).unwrap().upload_id
    }

    fn admit(queue: &mut UploadQueue, id: UploadId) -> Transition {
        queue
            .apply(UploadAction::Admit {
                upload_id: id,
                at: Utc::now(),
            })
            .unwrap()
    }

    fn to_uploading(queue: &mut UploadQueue, id: UploadId) {
        admit(queue, id);
        queue
            .apply(UploadAction::SessionReady {
                upload_id: id,
                uploaded_bytes: 0,
            })
            .unwrap();
    }

    fn fail(queue: &mut UploadQueue, id: UploadId, retryable: bool) -> Transition {
        queue
            .apply(UploadAction::AttemptFailed {
                upload_id: id,
                error: "connection reset".into(),
                retryable,
            })
            .unwrap()
    }

    #[test]
    fn enqueue_starts_pending() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);
        let p = queue.get(id).unwrap();
        assert_eq!(p.status, UploadStatus::Pending);
        assert_eq!(p.total_bytes, 10 * MB);
        assert_eq!(p.retry_count, 0);
        assert_eq!(queue.pending_ids(), vec![id]);
    }

    #[test]
    fn duplicate_enqueue_rejected() {
        let mut queue = UploadQueue::new(3);
        let item = UploadQueueItem::new(
            media(1),
            ContentMetadata::new("A"),
            Priority::Normal,
            3,
            Utc::now(),
        );
        queue
            .apply(UploadAction::Enqueue { item: item.clone() })
            .unwrap();
        let err = queue.apply(UploadAction::Enqueue { item }).unwrap_err();
        assert!(matches!(err, QueueError::DuplicateUpload(_)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn admission_control_n_plus_one() {
        let mut queue = UploadQueue::new(2);
        let ids: Vec<_> = (0..3).map(|_| enqueue(&mut queue, Priority::Normal)).collect();

        while let Some(id) = queue.next_admissible() {
            admit(&mut queue, id);
        }

        assert_eq!(queue.active_count(), 2);
        assert_eq!(queue.pending_ids(), vec![ids[2]]);
        assert!(!queue.can_start_new_upload());

        let err = queue
            .apply(UploadAction::Admit {
                upload_id: ids[2],
                at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, QueueError::AdmissionLimit { limit: 2 }));
        assert_eq!(queue.get(ids[2]).unwrap().status, UploadStatus::Pending);

        // Freeing a slot admits the waiting item.
        queue.apply(UploadAction::Cancel { upload_id: ids[0] }).unwrap();
        assert_eq!(queue.next_admissible(), Some(ids[2]));
    }

    #[test]
    fn priority_then_insertion_order() {
        let mut queue = UploadQueue::new(1);
        let low = enqueue(&mut queue, Priority::Low);
        let n1 = enqueue(&mut queue, Priority::Normal);
        let high = enqueue(&mut queue, Priority::High);
        let n2 = enqueue(&mut queue, Priority::Normal);

        assert_eq!(queue.pending_ids(), vec![high, n1, n2, low]);
        assert_eq!(queue.next_admissible(), Some(high));
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);

        let t = admit(&mut queue, id);
        assert_eq!(t.from, Some(UploadStatus::Pending));
        assert_eq!(t.to, UploadStatus::Preparing);
        assert!(t.item.started_at.is_some());

        queue
            .apply(UploadAction::SessionReady {
                upload_id: id,
                uploaded_bytes: 0,
            })
            .unwrap();
        for chunk in 1..=5 {
            queue
                .apply(UploadAction::Progress {
                    upload_id: id,
                    uploaded_bytes: chunk * 2 * MB,
                    bytes_per_second: Some(1000.0),
                    eta: None,
                })
                .unwrap();
        }
        assert_eq!(queue.get(id).unwrap().progress, 100.0);

        let t = queue
            .apply(UploadAction::TransferFinished { upload_id: id })
            .unwrap();
        assert_eq!(t.to, UploadStatus::Processing);

        let t = queue
            .apply(UploadAction::Completed {
                upload_id: id,
                at: Utc::now(),
            })
            .unwrap();
        assert_eq!(t.kind, TransitionKind::Completed);
        assert_eq!(t.item.status, UploadStatus::Completed);
        assert!(t.item.completed_at.is_some());
        assert!(queue.get(id).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn progress_never_decreases() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);
        to_uploading(&mut queue, id);

        let mut last = 0.0;
        for bytes in [2 * MB, 6 * MB, 4 * MB, 8 * MB, 20 * MB] {
            let t = queue
                .apply(UploadAction::Progress {
                    upload_id: id,
                    uploaded_bytes: bytes,
                    bytes_per_second: None,
                    eta: None,
                })
                .unwrap();
            assert!(t.item.progress >= last);
            assert!(t.item.uploaded_bytes <= t.item.total_bytes);
            last = t.item.progress;
        }
        let p = queue.get(id).unwrap();
        assert_eq!(p.uploaded_bytes, 10 * MB);
        assert_eq!(p.progress, 100.0);
    }

    #[test]
    fn invalid_action_leaves_state_untouched() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);
        let before = queue.snapshot();

        for action in [
            UploadAction::Progress {
                upload_id: id,
                uploaded_bytes: MB,
                bytes_per_second: None,
                eta: None,
            },
            UploadAction::TransferFinished { upload_id: id },
            UploadAction::Retry { upload_id: id },
            UploadAction::Dismiss { upload_id: id },
            UploadAction::AttemptFailed {
                upload_id: id,
                error: "x".into(),
                retryable: true,
            },
        ] {
            let err = queue.apply(action).unwrap_err();
            assert!(matches!(
                err,
                QueueError::InvalidTransition {
                    from: UploadStatus::Pending,
                    ..
                }
            ));
        }
        assert_eq!(queue.snapshot(), before);

        let err = queue
            .apply(UploadAction::Cancel {
                upload_id: UploadId::new(),
            })
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownUpload(_)));
    }

    #[test]
    fn retry_bound_fails_after_max_retries() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);
        to_uploading(&mut queue, id);

        let t = fail(&mut queue, id, true);
        assert_eq!(t.kind, TransitionKind::Retrying);
        assert_eq!(t.to, UploadStatus::Preparing);
        assert_eq!(t.item.retry_count, 1);
        assert_eq!(queue.active_count(), 1);

        queue
            .apply(UploadAction::SessionReady {
                upload_id: id,
                uploaded_bytes: 6 * MB,
            })
            .unwrap();
        assert_eq!(fail(&mut queue, id, true).kind, TransitionKind::Retrying);

        queue
            .apply(UploadAction::SessionReady {
                upload_id: id,
                uploaded_bytes: 6 * MB,
            })
            .unwrap();
        let t = fail(&mut queue, id, true);
        assert_eq!(t.kind, TransitionKind::Failed);
        assert_eq!(t.item.status, UploadStatus::Failed);
        assert_eq!(t.item.retry_count, 3);
        assert_eq!(t.item.error.as_deref(), Some("connection reset"));
        assert_eq!(queue.active_count(), 0);

        // No automatic path out of failed.
        assert!(queue.next_admissible().is_none());
        assert!(
            queue
                .apply(UploadAction::Admit {
                    upload_id: id,
                    at: Utc::now()
                })
                .is_err()
        );
        assert!(
            queue
                .apply(UploadAction::AttemptFailed {
                    upload_id: id,
                    error: "again".into(),
                    retryable: true
                })
                .is_err()
        );
        assert_eq!(queue.get(id).unwrap().retry_count, 3);
    }

    #[test]
    fn non_retryable_error_fails_immediately() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);
        to_uploading(&mut queue, id);

        let t = fail(&mut queue, id, false);
        assert_eq!(t.kind, TransitionKind::Failed);
        assert_eq!(t.item.retry_count, 1);
    }

    #[test]
    fn manual_retry_resets_and_is_bounded() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);
        let other = enqueue(&mut queue, Priority::Normal);

        for round in 1..=3 {
            admit(&mut queue, id);
            fail(&mut queue, id, false);

            let t = queue.apply(UploadAction::Retry { upload_id: id }).unwrap();
            assert_eq!(t.kind, TransitionKind::Requeued);
            assert_eq!(t.to, UploadStatus::Pending);
            assert_eq!(t.item.retry_count, 0);
            assert_eq!(t.item.progress, 0.0);
            assert!(t.item.error.is_none());
            assert!(t.item.started_at.is_none());
            assert_eq!(t.item.manual_retries, round);
            // Re-enqueued behind items of the same priority.
            assert_eq!(queue.pending_ids(), vec![other, id]);
        }

        let readmitted_at = Utc::now() + chrono::Duration::seconds(30);
        queue
            .apply(UploadAction::Admit {
                upload_id: id,
                at: readmitted_at,
            })
            .unwrap();
        assert_eq!(queue.get(id).unwrap().started_at, Some(readmitted_at));
        fail(&mut queue, id, false);
        let err = queue.apply(UploadAction::Retry { upload_id: id }).unwrap_err();
        assert!(matches!(err, QueueError::RetryLimit { max_retries: 3, .. }));
        assert_eq!(queue.get(id).unwrap().status, UploadStatus::Failed);
    }

    #[test]
    fn cancel_removes_from_queue() {
        let mut queue = UploadQueue::new(3);
        let pending = enqueue(&mut queue, Priority::Normal);
        let active = enqueue(&mut queue, Priority::Normal);
        to_uploading(&mut queue, active);

        let t = queue
            .apply(UploadAction::Cancel { upload_id: pending })
            .unwrap();
        assert_eq!(t.kind, TransitionKind::Cancelled);
        assert_eq!(t.from, Some(UploadStatus::Pending));
        assert!(queue.pending_ids().is_empty());

        let t = queue
            .apply(UploadAction::Cancel { upload_id: active })
            .unwrap();
        assert_eq!(t.item.status, UploadStatus::Cancelled);
        assert!(queue.is_empty());
        assert_eq!(queue.active_count(), 0);
    }

    #[test]
    fn failed_items_cannot_be_cancelled_but_can_be_dismissed() {
        let mut queue = UploadQueue::new(3);
        let id = enqueue(&mut queue, Priority::Normal);
        admit(&mut queue, id);
        fail(&mut queue, id, false);

        assert!(queue.apply(UploadAction::Cancel { upload_id: id }).is_err());
        let t = queue.apply(UploadAction::Dismiss { upload_id: id }).unwrap();
        assert_eq!(t.kind, TransitionKind::Dismissed);
        assert_eq!(t.item.status, UploadStatus::Failed);
        assert!(queue.is_empty());
    }

    #[test]
    fn raising_limit_admits_more() {
        let mut queue = UploadQueue::new(1);
        let a = enqueue(&mut queue, Priority::Normal);
        let b = enqueue(&mut queue, Priority::Normal);
        admit(&mut queue, a);
        assert!(queue.next_admissible().is_none());

        assert_eq!(queue.set_max_concurrent(0), 1);
        assert_eq!(queue.set_max_concurrent(2), 2);
        assert_eq!(queue.next_admissible(), Some(b));
    }
}
