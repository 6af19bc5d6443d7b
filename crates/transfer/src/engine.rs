use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use fanvault_protocol::messages::{ChunkAck, UploadChunkRequest};

use crate::TransferError;
use crate::chunked::{Chunk, checksum_bytes};
use crate::session::UploadSession;
use crate::transport::{TransportFuture, UploadTransport};

/// Awaits a transport call, failing with [`TransferError::Timeout`] once
/// `limit` elapses.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    fut: TransportFuture<'_, T>,
) -> Result<T, TransferError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TransferError::Timeout(limit))?
}

/// Uploads single chunks of a session.
///
/// Stateless with respect to sessions: callers record acknowledged chunks.
pub struct ChunkTransferEngine {
    transport: Arc<dyn UploadTransport>,
    request_timeout: Duration,
    retry_attempts: u32,
}

impl ChunkTransferEngine {
    pub fn new(transport: Arc<dyn UploadTransport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
            retry_attempts: 0,
        }
    }

    /// Extra immediate attempts for a chunk that fails with a retryable error.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Sends `chunk` to the session's upload URL and verifies the ack.
    pub async fn send_chunk(
        &self,
        session: &UploadSession,
        chunk: &Chunk,
    ) -> Result<(), TransferError> {
        let hash = checksum_bytes(&chunk.data);
        let mut attempt = 0;

        loop {
            let req = UploadChunkRequest {
                upload_id: session.upload_id,
                session_id: session.session_id.clone(),
                chunk_index: chunk.index,
                chunk_data: chunk.data.clone(),
                chunk_hash: hash.clone(),
            };

            let result = with_timeout(
                self.request_timeout,
                self.transport.upload_chunk(session.upload_url.clone(), req),
            )
            .await
            .and_then(|ack| verify_ack(&ack, chunk.index, &hash));

            match result {
                Ok(()) => {
                    debug!(
                        upload_id = %session.upload_id,
                        chunk = chunk.index,
                        bytes = chunk.data.len(),
                        "chunk acknowledged"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.retry_attempts => {
                    attempt += 1;
                    warn!(
                        upload_id = %session.upload_id,
                        chunk = chunk.index,
                        attempt,
                        error = %e,
                        "chunk failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn verify_ack(ack: &ChunkAck, index: u32, hash: &str) -> Result<(), TransferError> {
    if !ack.received {
        return Err(TransferError::ChunkRejected {
            index,
            reason: "server did not accept chunk".into(),
        });
    }
    if ack.chunk_index != index {
        return Err(TransferError::ChunkRejected {
            index,
            reason: format!("ack is for chunk {}", ack.chunk_index),
        });
    }
    if !ack.chunk_hash.is_empty() && ack.chunk_hash != hash {
        return Err(TransferError::ChecksumMismatch { index });
    }
    Ok(())
}
