use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::session::UploadSession;

/// Snapshot reported after every acknowledged chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub uploaded_chunks: u32,
    pub total_chunks: u32,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    /// 0.0 to 100.0.
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<Duration>,
}

impl TransferProgress {
    /// Derives progress from the session's acknowledged coverage.
    pub fn from_session(session: &UploadSession, throughput: &ThroughputEstimator) -> Self {
        let uploaded_bytes = session.uploaded_bytes();
        let total_bytes = session.file_size;
        let percentage = if session.is_complete() {
            100.0
        } else if total_bytes == 0 {
            0.0
        } else {
            (uploaded_bytes as f64 / total_bytes as f64 * 100.0).min(100.0)
        };
        Self {
            uploaded_chunks: session.uploaded_chunks.len() as u32,
            total_chunks: session.total_chunks,
            uploaded_bytes,
            total_bytes,
            percentage,
            bytes_per_second: throughput.bytes_per_second(),
            eta: throughput.eta(total_bytes.saturating_sub(uploaded_bytes)),
        }
    }
}

// ---------------------------------------------------------------------------
// ThroughputEstimator
// ---------------------------------------------------------------------------

/// Average transfer speed since the estimator was created.
///
/// Cumulative rather than windowed: bytes already covered by a resumed
/// session are not counted, only bytes sent through this estimator.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    started: Instant,
    bytes: u64,
}

impl ThroughputEstimator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            bytes: 0,
        }
    }

    /// Records `bytes` transferred.
    pub fn record(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    /// Returns `None` until some time has elapsed and some bytes moved.
    pub fn bytes_per_second(&self) -> Option<f64> {
        let elapsed = self.started.elapsed();
        if elapsed.is_zero() || self.bytes == 0 {
            return None;
        }
        Some(self.bytes as f64 / elapsed.as_secs_f64())
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second()?;
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new()
    }
}
