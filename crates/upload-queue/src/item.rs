use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fanvault_protocol::{ContentMetadata, MediaFile, UploadId};

use crate::status::UploadStatus;

/// Scheduling priority; higher is admitted first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            _ => Err(format!("unknown priority: {s}")),
        }
    }
}

/// Observable state of one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub upload_id: UploadId,
    pub media: MediaFile,
    pub metadata: ContentMetadata,
    pub status: UploadStatus,
    /// 0.0 to 100.0.
    pub progress: f64,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<Duration>,
    /// Failed automatic attempts since the last manual retry.
    pub retry_count: u32,
    pub max_retries: u32,
    /// Manual retries granted so far.
    #[serde(default)]
    pub manual_retries: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    pub(crate) fn set_bytes(&mut self, uploaded_bytes: u64) {
        self.uploaded_bytes = uploaded_bytes.min(self.total_bytes);
        self.progress = percentage(self.uploaded_bytes, self.total_bytes);
    }
}

pub(crate) fn percentage(uploaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (uploaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// One entry of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQueueItem {
    pub upload_id: UploadId,
    pub progress: UploadProgress,
    pub priority: Priority,
    /// Insertion sequence, assigned on enqueue.
    pub seq: u64,
}

impl UploadQueueItem {
    /// Creates a pending item with a fresh upload id.
    pub fn new(
        media: MediaFile,
        metadata: ContentMetadata,
        priority: Priority,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self::with_id(UploadId::new(), media, metadata, priority, max_retries, now)
    }

    pub fn with_id(
        upload_id: UploadId,
        media: MediaFile,
        metadata: ContentMetadata,
        priority: Priority,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let total_bytes = media.size;
        Self {
            upload_id,
            progress: UploadProgress {
                upload_id,
                media,
                metadata,
                status: UploadStatus::Pending,
                progress: 0.0,
                uploaded_bytes: 0,
                total_bytes,
                bytes_per_second: None,
                eta: None,
                retry_count: 0,
                max_retries,
                manual_retries: 0,
                created_at: now,
                started_at: None,
                completed_at: None,
                error: None,
            },
            priority,
            seq: 0,
        }
    }

    pub fn status(&self) -> UploadStatus {
        self.progress.status
    }
}
