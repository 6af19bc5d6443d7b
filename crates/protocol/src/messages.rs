use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContentMetadata, UploadId};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens a resumable upload session (`POST /uploads/start`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadRequest {
    pub upload_id: UploadId,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub metadata: ContentMetadata,
    /// Chunk size the client would like to use.
    pub chunk_size: u64,
}

/// Sends one chunk to the session's upload URL.
///
/// `chunk_data` is base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkRequest {
    pub upload_id: UploadId,
    pub session_id: String,
    pub chunk_index: u32,
    #[serde(with = "base64_bytes")]
    pub chunk_data: Vec<u8>,
    /// SHA-256 hex digest of `chunk_data`.
    pub chunk_hash: String,
}

/// Finalizes an upload (`POST /uploads/complete`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub upload_id: UploadId,
    pub total_chunks: u32,
    /// SHA-256 hex digest of the whole file.
    pub final_hash: String,
    pub metadata: ContentMetadata,
}

/// Cancels an upload session (`POST /uploads/cancel`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelUploadRequest {
    pub upload_id: UploadId,
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Session contract returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadResponse {
    pub session_id: String,
    pub upload_url: String,
    /// Negotiated chunk size (0 = use the client's).
    #[serde(default)]
    pub chunk_size: u64,
    pub expires_at: DateTime<Utc>,
}

/// Acknowledges a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub received: bool,
    pub chunk_index: u32,
    /// Digest computed by the server, echoed for verification.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chunk_hash: String,
}

/// Server-side processing state after finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Queued,
    Processing,
    Ready,
    Failed,
}

/// Result of `POST /uploads/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
