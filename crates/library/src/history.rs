use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fanvault_protocol::{ContentMetadata, UploadId};

/// Outcome recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Terminal record of a finished upload.
///
/// Append-only; only `metadata` of a completed entry may be edited later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadHistoryItem {
    pub upload_id: UploadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub file_name: String,
    pub metadata: ContentMetadata,
    pub status: HistoryStatus,
    pub uploaded_at: DateTime<Utc>,
    /// Wall time from admission to the outcome, in milliseconds.
    pub processing_time_ms: u64,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
