use std::future::Future;
use std::pin::Pin;

use fanvault_protocol::messages::{
    CancelUploadRequest, ChunkAck, CompleteUploadRequest, CompleteUploadResponse,
    StartUploadRequest, StartUploadResponse, UploadChunkRequest,
};

use crate::TransferError;

/// Boxed future returned by [`UploadTransport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

/// Abstract connection to the remote upload service.
///
/// The uploader implements this on top of HTTP; tests use in-memory mocks.
/// Implementations map connection and server-side transient failures to
/// [`TransferError::Transport`] and permanent refusals to
/// [`TransferError::Rejected`]. Timeouts are applied by the caller.
pub trait UploadTransport: Send + Sync {
    /// Opens a session (`POST /uploads/start`).
    fn start_upload(&self, req: StartUploadRequest) -> TransportFuture<'_, StartUploadResponse>;

    /// Sends one chunk to the session's upload URL.
    fn upload_chunk(&self, upload_url: String, req: UploadChunkRequest) -> TransportFuture<'_, ChunkAck>;

    /// Finalizes an upload (`POST /uploads/complete`).
    fn complete_upload(
        &self,
        req: CompleteUploadRequest,
    ) -> TransportFuture<'_, CompleteUploadResponse>;

    /// Cancels a session (`POST /uploads/cancel`).
    fn cancel_upload(&self, req: CancelUploadRequest) -> TransportFuture<'_, ()>;
}
