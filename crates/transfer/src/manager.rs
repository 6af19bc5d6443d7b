use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fanvault_protocol::messages::{
    CancelUploadRequest, CompleteUploadRequest, ProcessingStatus, StartUploadRequest,
};
use fanvault_protocol::{ContentMetadata, MediaFile, UploadId};

use crate::chunked::{ChunkReader, calculate_file_checksum};
use crate::engine::{ChunkTransferEngine, with_timeout};
use crate::progress::{ThroughputEstimator, TransferProgress};
use crate::session::UploadSession;
use crate::store::SessionStore;
use crate::transport::UploadTransport;
use crate::validation::validate_file_name;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Tunables for [`UploadSessionManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Preferred chunk size; the server may negotiate it down.
    pub chunk_size: u64,
    /// Bound on every individual transport call.
    pub request_timeout: Duration,
    /// Extra immediate attempts per chunk.
    pub chunk_retry_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: Duration::from_secs(60),
            chunk_retry_attempts: 0,
        }
    }
}

/// Outcome of a finalized upload.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub upload_id: UploadId,
    pub content_id: Option<String>,
    pub processing_status: ProcessingStatus,
    pub download_url: Option<String>,
    pub thumbnail_url: Option<String>,
    /// SHA-256 hex digest of the whole file.
    pub final_hash: String,
    pub file_size: u64,
}

/// Negotiates, persists and resumes upload sessions.
///
/// The session record is written after every acknowledged chunk, so a
/// transfer interrupted at any point resumes with exactly the chunks that
/// were not yet acknowledged.
pub struct UploadSessionManager {
    transport: Arc<dyn UploadTransport>,
    store: Arc<dyn SessionStore>,
    engine: ChunkTransferEngine,
    config: SessionConfig,
}

impl UploadSessionManager {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Self {
        let engine = ChunkTransferEngine::new(Arc::clone(&transport), config.request_timeout)
            .with_retry_attempts(config.chunk_retry_attempts);
        Self {
            transport,
            store,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a new session with the server and persists it.
    pub async fn start_session(
        &self,
        upload_id: UploadId,
        media: &MediaFile,
        metadata: &ContentMetadata,
    ) -> Result<UploadSession, TransferError> {
        validate_file_name(&media.name)?;

        let req = StartUploadRequest {
            upload_id,
            file_name: media.name.clone(),
            file_size: media.size,
            mime_type: media.mime_type.clone(),
            metadata: metadata.clone(),
            chunk_size: self.config.chunk_size,
        };
        let resp = with_timeout(self.config.request_timeout, self.transport.start_upload(req)).await?;

        let chunk_size = effective_chunk_size(resp.chunk_size, self.config.chunk_size);
        let session = UploadSession::new(
            resp.session_id,
            upload_id,
            resp.upload_url,
            chunk_size,
            media.size,
            resp.expires_at,
            Utc::now(),
        );
        self.persist(&session).await?;

        info!(
            upload_id = %upload_id,
            session_id = %session.session_id,
            chunk_size,
            total_chunks = session.total_chunks,
            "upload session started"
        );
        Ok(session)
    }

    /// Loads a persisted, unexpired session.
    ///
    /// An expired record is deleted and reported as absent.
    pub fn resume(&self, upload_id: UploadId) -> Result<Option<UploadSession>, TransferError> {
        let Some(session) = self.store.load(upload_id)? else {
            return Ok(None);
        };
        if session.is_expired(Utc::now()) {
            info!(upload_id = %upload_id, "session expired, discarding");
            self.store.delete(upload_id)?;
            return Ok(None);
        }
        debug!(
            upload_id = %upload_id,
            uploaded = session.uploaded_chunks.len(),
            total = session.total_chunks,
            "resuming session"
        );
        Ok(Some(session))
    }

    /// Resumes the persisted session for `upload_id` or starts a fresh one.
    pub async fn resume_or_start(
        &self,
        upload_id: UploadId,
        media: &MediaFile,
        metadata: &ContentMetadata,
    ) -> Result<UploadSession, TransferError> {
        match self.resume(upload_id)? {
            Some(session) => Ok(session),
            None => self.start_session(upload_id, media, metadata).await,
        }
    }

    /// Uploads every chunk not yet acknowledged, in index order.
    ///
    /// `on_progress` runs after each chunk is acknowledged and persisted.
    /// The first failing chunk aborts the transfer; coverage reached so far
    /// stays persisted. Returns the fully covered session.
    pub async fn transfer<F>(
        &self,
        upload_id: UploadId,
        media: &MediaFile,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<UploadSession, TransferError>
    where
        F: FnMut(TransferProgress) + Send,
    {
        let mut session = self
            .store
            .load(upload_id)?
            .ok_or(TransferError::SessionNotFound(upload_id))?;
        let missing: Vec<u32> = session.missing_chunks().collect();
        if missing.is_empty() {
            return Ok(session);
        }

        let mut reader = tokio::task::spawn_blocking({
            let path = media.path().to_path_buf();
            let (file_size, chunk_size) = (session.file_size, session.chunk_size);
            move || ChunkReader::open(&path, file_size, chunk_size)
        })
        .await
        .map_err(join_error)??;

        let mut throughput = ThroughputEstimator::new();

        for index in missing {
            check_cancelled(cancel)?;

            let (r, read) = tokio::task::spawn_blocking(move || {
                let chunk = reader.read_chunk(index);
                (reader, chunk)
            })
            .await
            .map_err(join_error)?;
            reader = r;
            let chunk = read?.ok_or(TransferError::SizeMismatch {
                expected: session.file_size,
                actual: reader.file_size(),
            })?;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                sent = self.engine.send_chunk(&session, &chunk) => sent?,
            }

            check_cancelled(cancel)?;
            session.mark_uploaded(index);
            self.persist(&session).await?;
            throughput.record(chunk.data.len() as u64);

            on_progress(TransferProgress::from_session(&session, &throughput));
        }

        info!(
            upload_id = %upload_id,
            total_chunks = session.total_chunks,
            "all chunks uploaded"
        );
        Ok(session)
    }

    /// Finalizes a fully covered session and deletes its local record.
    pub async fn complete(
        &self,
        upload_id: UploadId,
        media: &MediaFile,
        metadata: &ContentMetadata,
    ) -> Result<CompletionResult, TransferError> {
        let session = self
            .store
            .load(upload_id)?
            .ok_or(TransferError::SessionNotFound(upload_id))?;

        if !session.is_complete() {
            let err = TransferError::IncompleteSession {
                upload_id,
                uploaded: session.uploaded_chunks.len(),
                total: session.total_chunks,
            };
            error!(upload_id = %upload_id, error = %err, "complete called before all chunks were uploaded");
            return Err(err);
        }

        let final_hash = tokio::task::spawn_blocking({
            let path = media.path().to_path_buf();
            move || calculate_file_checksum(&path)
        })
        .await
        .map_err(join_error)??;

        let req = CompleteUploadRequest {
            upload_id,
            total_chunks: session.total_chunks,
            final_hash: final_hash.clone(),
            metadata: metadata.clone(),
        };
        let resp =
            with_timeout(self.config.request_timeout, self.transport.complete_upload(req)).await?;

        if !resp.success {
            let reason = resp
                .error
                .unwrap_or_else(|| "completion refused".to_string());
            error!(upload_id = %upload_id, reason = %reason, "server rejected upload");
            return Err(TransferError::Rejected(reason));
        }

        self.store.delete(upload_id)?;
        info!(
            upload_id = %upload_id,
            content_id = ?resp.content_id,
            "upload completed"
        );

        Ok(CompletionResult {
            upload_id,
            content_id: resp.content_id,
            processing_status: resp.processing_status,
            download_url: resp.download_url,
            thumbnail_url: resp.thumbnail_url,
            final_hash,
            file_size: session.file_size,
        })
    }

    /// Tears down a session: best-effort remote cancel, then local deletion.
    pub async fn cancel(&self, upload_id: UploadId) -> Result<(), TransferError> {
        if let Some(session) = self.store.load(upload_id)? {
            let req = CancelUploadRequest {
                upload_id,
                session_id: session.session_id,
            };
            if let Err(e) =
                with_timeout(self.config.request_timeout, self.transport.cancel_upload(req)).await
            {
                warn!(upload_id = %upload_id, error = %e, "remote cancel failed");
            }
        }
        self.store.delete(upload_id)?;
        info!(upload_id = %upload_id, "upload session cancelled");
        Ok(())
    }

    /// Persisted sessions that have not expired.
    pub fn recoverable_sessions(&self) -> Result<Vec<UploadSession>, TransferError> {
        let now = Utc::now();
        let mut sessions: Vec<_> = self
            .store
            .list()?
            .into_iter()
            .filter(|s| !s.is_expired(now))
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    /// Saves `session` on the blocking pool.
    async fn persist(&self, session: &UploadSession) -> Result<(), TransferError> {
        let store = Arc::clone(&self.store);
        let session = session.clone();
        tokio::task::spawn_blocking(move || store.save(&session))
            .await
            .map_err(join_error)?
    }
}

/// Server value when it is in `1..=configured`, otherwise the configured
/// size. A configured size of 0 means [`DEFAULT_CHUNK_SIZE`].
fn effective_chunk_size(server: u64, configured: u64) -> u64 {
    let configured = if configured == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        configured
    };
    if (1..=configured).contains(&server) {
        server
    } else {
        configured
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), TransferError> {
    if cancel.is_cancelled() {
        Err(TransferError::Cancelled)
    } else {
        Ok(())
    }
}

fn join_error(e: tokio::task::JoinError) -> TransferError {
    TransferError::Io(std::io::Error::other(format!("task join error: {e}")))
}
