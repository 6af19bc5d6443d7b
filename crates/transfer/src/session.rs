use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fanvault_protocol::UploadId;

use crate::chunked::chunk_bounds;

/// Server-side contract for one resumable upload.
///
/// Persisted after every acknowledged chunk so a restarted process can
/// continue where it stopped. `uploaded_chunks` only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub session_id: String,
    pub upload_id: UploadId,
    pub chunk_size: u64,
    pub file_size: u64,
    pub total_chunks: u32,
    #[serde(default)]
    pub uploaded_chunks: BTreeSet<u32>,
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    /// Creates a session with no chunks uploaded yet.
    ///
    /// `chunk_size` must be non-zero.
    pub fn new(
        session_id: String,
        upload_id: UploadId,
        upload_url: String,
        chunk_size: u64,
        file_size: u64,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            upload_id,
            chunk_size,
            file_size,
            total_chunks: total_chunks(file_size, chunk_size),
            uploaded_chunks: BTreeSet::new(),
            upload_url,
            expires_at,
            created_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Indices still to be uploaded, ascending.
    pub fn missing_chunks(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.total_chunks).filter(|i| !self.uploaded_chunks.contains(i))
    }

    /// Byte length of chunk `index` (0 when out of range).
    pub fn chunk_len(&self, index: u32) -> u64 {
        chunk_bounds(self.file_size, self.chunk_size, index)
            .map(|(_, len)| len)
            .unwrap_or(0)
    }

    /// Sum of the sizes of all acknowledged chunks.
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_chunks.iter().map(|&i| self.chunk_len(i)).sum()
    }

    /// Every chunk acknowledged. A non-empty file with no chunks is never
    /// complete.
    pub fn is_complete(&self) -> bool {
        if self.total_chunks == 0 {
            return self.file_size == 0;
        }
        self.uploaded_chunks.len() as u64 == u64::from(self.total_chunks)
    }

    /// Records chunk `index` as acknowledged. Returns false for indices
    /// outside the session or already recorded.
    pub fn mark_uploaded(&mut self, index: u32) -> bool {
        index < self.total_chunks && self.uploaded_chunks.insert(index)
    }
}

/// `ceil(file_size / chunk_size)`, saturating at `u32::MAX`.
fn total_chunks(file_size: u64, chunk_size: u64) -> u32 {
    if chunk_size == 0 {
        return 0;
    }
    u32::try_from(file_size.div_ceil(chunk_size)).unwrap_or(u32::MAX)
}
