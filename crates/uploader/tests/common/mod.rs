#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};

use fanvault_protocol::messages::{
    CancelUploadRequest, ChunkAck, CompleteUploadRequest, CompleteUploadResponse,
    ProcessingStatus, StartUploadRequest, StartUploadResponse, UploadChunkRequest,
};
use fanvault_protocol::{MediaFile, UploadId};
use fanvault_transfer::{TransferError, TransportFuture, UploadTransport};
use fanvault_uploader::{RetryConfig, UploadEvent, UploaderConfig};

pub const MB: u64 = 1024 * 1024;

/// In-memory upload service recording every request.
pub struct MockTransport {
    state: Mutex<State>,
    starts_open: watch::Sender<bool>,
}

#[derive(Default)]
struct State {
    next_session: u32,
    chunk_failures: HashMap<u32, u32>,
    chunk_delay: Option<Duration>,
    starts: Vec<StartUploadRequest>,
    chunks: Vec<UploadChunkRequest>,
    completes: Vec<CompleteUploadRequest>,
    cancels: Vec<CancelUploadRequest>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (starts_open, _) = watch::channel(true);
        Self {
            state: Mutex::new(State::default()),
            starts_open,
        }
    }

    /// Makes `start_upload` wait until [`release_starts`](Self::release_starts).
    pub fn hold_starts(&self) {
        self.starts_open.send_replace(false);
    }

    pub fn release_starts(&self) {
        self.starts_open.send_replace(true);
    }

    /// Fails the next `times` uploads of chunk `index` with a transport error.
    pub fn fail_chunk(&self, index: u32, times: u32) {
        self.state.lock().unwrap().chunk_failures.insert(index, times);
    }

    pub fn set_chunk_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().chunk_delay = delay;
    }

    pub fn start_requests(&self) -> Vec<StartUploadRequest> {
        self.state.lock().unwrap().starts.clone()
    }

    /// Indices of every chunk request, in arrival order.
    pub fn chunk_indices(&self) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .chunks
            .iter()
            .map(|c| c.chunk_index)
            .collect()
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
            let mut open = self.starts_open.subscribe();
            let _ = open.wait_for(|open| *open).await;

            let mut state = self.state.lock().unwrap();
            state.next_session += 1;
            let session_id = format!("session-{}", state.next_session);
            state.starts.push(req);
            Ok(StartUploadResponse {
                upload_url: format!("https://upload.example/{session_id}"),
                session_id,
                chunk_size: 0,
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
        })
    }

    fn upload_chunk(
        &self,
        _upload_url: String,
        req: UploadChunkRequest,
    ) -> TransportFuture<'_, ChunkAck> {
        Box::pin(async move {
            let delay = self.state.lock().unwrap().chunk_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            let index = req.chunk_index;
            let hash = req.chunk_hash.clone();
            state.chunks.push(req);
            if let Some(left) = state.chunk_failures.get_mut(&index)
                && *left > 0
            {
                *left -= 1;
                return Err(TransferError::Transport(format!(
                    "connection reset on chunk {index}"
                )));
            }
            Ok(ChunkAck {
                received: true,
                chunk_index: index,
                chunk_hash: hash,
            })
        })
    }

    fn complete_upload(
        &self,
        req: CompleteUploadRequest,
    ) -> TransportFuture<'_, CompleteUploadResponse> {
        Box::pin(async move {
            let content_id = format!("content-{}", req.upload_id);
            self.state.lock().unwrap().completes.push(req);
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
            self.state.lock().unwrap().cancels.push(req);
            Ok(())
        })
    }
}

/// Writes a file of `size` patterned bytes and describes it.
pub fn write_media(dir: &Path, name: &str, mime_type: &str, size: u64) -> MediaFile {
    let path = dir.join(name);
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    MediaFile {
        uri: path.to_string_lossy().into_owned(),
        name: name.into(),
        mime_type: mime_type.into(),
        size,
        width: None,
        height: None,
        duration: None,
        thumbnail: None,
    }
}

/// Configuration rooted at `data_dir` with near-instant retries.
pub fn test_config(data_dir: &Path) -> UploaderConfig {
    UploaderConfig {
        data_dir: data_dir.to_path_buf(),
        request_timeout_secs: 10,
        retry: RetryConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_factor: 2.0,
            jitter: 0.0,
        },
        ..UploaderConfig::default()
    }
}

/// Waits for the first event matching `pred`.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<UploadEvent>, mut pred: F) -> UploadEvent
where
    F: FnMut(&UploadEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for upload event")
}

/// Waits until `upload_id` completes, fails, is cancelled or dismissed.
pub async fn wait_for_final(
    rx: &mut broadcast::Receiver<UploadEvent>,
    upload_id: UploadId,
) -> UploadEvent {
    wait_for(rx, |e| e.upload_id() == upload_id && e.is_final()).await
}
