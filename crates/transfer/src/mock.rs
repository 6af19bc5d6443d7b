//! In-memory [`UploadTransport`] used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use fanvault_protocol::messages::{
    CancelUploadRequest, ChunkAck, CompleteUploadRequest, CompleteUploadResponse,
    ProcessingStatus, StartUploadRequest, StartUploadResponse, UploadChunkRequest,
};

use crate::TransferError;
use crate::chunked::checksum_bytes;
use crate::transport::{TransportFuture, UploadTransport};

#[derive(Default)]
struct MockState {
    starts: Vec<StartUploadRequest>,
    chunk_requests: Vec<(String, UploadChunkRequest)>,
    received: Vec<u32>,
    completes: Vec<CompleteUploadRequest>,
    cancels: Vec<CancelUploadRequest>,
    /// Remaining injected failures per chunk index.
    chunk_failures: HashMap<u32, u32>,
    corrupt_hashes: bool,
    chunk_delay: Option<Duration>,
    server_chunk_size: u64,
    expires_at: Option<DateTime<Utc>>,
    reject_complete: bool,
    fail_cancel: bool,
    sessions_opened: u32,
}

pub(crate) struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn fail_chunk(&self, index: u32, times: u32) {
        self.state.lock().unwrap().chunk_failures.insert(index, times);
    }

    pub fn set_corrupt_hashes(&self, corrupt: bool) {
        self.state.lock().unwrap().corrupt_hashes = corrupt;
    }

    pub fn set_chunk_delay(&self, delay: Duration) {
        self.state.lock().unwrap().chunk_delay = Some(delay);
    }

    pub fn set_server_chunk_size(&self, size: u64) {
        self.state.lock().unwrap().server_chunk_size = size;
    }

    pub fn set_expires_at(&self, at: DateTime<Utc>) {
        self.state.lock().unwrap().expires_at = Some(at);
    }

    pub fn reject_complete(&self) {
        self.state.lock().unwrap().reject_complete = true;
    }

    pub fn fail_cancel(&self) {
        self.state.lock().unwrap().fail_cancel = true;
    }

    pub fn start_requests(&self) -> Vec<StartUploadRequest> {
        self.state.lock().unwrap().starts.clone()
    }

    pub fn chunk_requests(&self) -> Vec<(String, UploadChunkRequest)> {
        self.state.lock().unwrap().chunk_requests.clone()
    }

    /// Every attempted chunk index, in order, including failed attempts.
    pub fn chunk_attempts(&self) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .chunk_requests
            .iter()
            .map(|(_, r)| r.chunk_index)
            .collect()
    }

    /// Chunk indices acknowledged, in order.
    pub fn received_chunks(&self) -> Vec<u32> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn complete_requests(&self) -> Vec<CompleteUploadRequest> {
        self.state.lock().unwrap().completes.clone()
    }

    pub fn cancel_requests(&self) -> Vec<CancelUploadRequest> {
        self.state.lock().unwrap().cancels.clone()
    }
}

impl UploadTransport for MockTransport {
    fn start_upload(&self, req: StartUploadRequest) -> TransportFuture<'_, StartUploadResponse> {
        Box::pin(async move {
            let mut s = self.state.lock().unwrap();
            s.sessions_opened += 1;
            let session_id = format!("session-{}", s.sessions_opened);
            let resp = StartUploadResponse {
                upload_url: format!("https://upload.example/{session_id}"),
                session_id,
                chunk_size: s.server_chunk_size,
                expires_at: s
                    .expires_at
                    .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(24)),
            };
            s.starts.push(req);
            Ok(resp)
        })
    }

    fn upload_chunk(&self, upload_url: String, req: UploadChunkRequest) -> TransportFuture<'_, ChunkAck> {
        Box::pin(async move {
            let index = req.chunk_index;
            let hash = checksum_bytes(&req.chunk_data);
            let (delay, fail, corrupt) = {
                let mut s = self.state.lock().unwrap();
                s.chunk_requests.push((upload_url, req));
                let fail = match s.chunk_failures.get_mut(&index) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                };
                (s.chunk_delay, fail, s.corrupt_hashes)
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(TransferError::Transport(format!(
                    "connection reset on chunk {index}"
                )));
            }

            self.state.lock().unwrap().received.push(index);
            Ok(ChunkAck {
                received: true,
                chunk_index: index,
                chunk_hash: if corrupt { "0".repeat(64) } else { hash },
            })
        })
    }

    fn complete_upload(
        &self,
        req: CompleteUploadRequest,
    ) -> TransportFuture<'_, CompleteUploadResponse> {
        Box::pin(async move {
            let mut s = self.state.lock().unwrap();
            let content_id = format!("content-{}", req.upload_id);
            s.completes.push(req);
            if s.reject_complete {
                return Ok(CompleteUploadResponse {
                    success: false,
                    content_id: None,
                    processing_status: ProcessingStatus::Failed,
                    download_url: None,
                    thumbnail_url: None,
                    error: Some("hash mismatch".into()),
                });
            }
            Ok(CompleteUploadResponse {
                success: true,
                content_id: Some(content_id),
                processing_status: ProcessingStatus::Processing,
                download_url: None,
                thumbnail_url: None,
                error: None,
            })
        })
    }

    fn cancel_upload(&self, req: CancelUploadRequest) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let mut s = self.state.lock().unwrap();
            s.cancels.push(req);
            if s.fail_cancel {
                return Err(TransferError::Transport("cancel endpoint down".into()));
            }
            Ok(())
        })
    }
}
