//! Upload service client.
//!
//! Async HTTP transport using `reqwest` with optional Bearer token
//! authentication.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use fanvault_protocol::messages::{
    CancelUploadRequest, ChunkAck, CompleteUploadRequest, CompleteUploadResponse,
    StartUploadRequest, StartUploadResponse, UploadChunkRequest,
};
use fanvault_transfer::{TransferError, TransportFuture, UploadTransport};

use crate::error::UploaderError;

/// [`UploadTransport`] over HTTP + JSON.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str, auth_token: Option<&str>) -> Result<Self, UploaderError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| UploaderError::InvalidToken)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a service path or a server-issued URL.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<Req, Resp>(&self, url: String, body: &Req) -> Result<Resp, TransferError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let bytes = self.send(url, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Performs a POST and returns the body of a successful response.
    async fn send<Req>(&self, url: String, body: &Req) -> Result<Vec<u8>, TransferError>
    where
        Req: Serialize + ?Sized,
    {
        debug!(url = %url, "POST");
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransferError::Transport(e.to_string()))?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| TransferError::Transport(e.to_string()))
    }
}

/// Server errors, throttling and request timeouts are transient; any other
/// refusal is permanent.
fn status_error(status: StatusCode, body: &str) -> TransferError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        TransferError::Transport(message)
    } else {
        TransferError::Rejected(message)
    }
}

impl UploadTransport for HttpTransport {
    fn start_upload(&self, req: StartUploadRequest) -> TransportFuture<'_, StartUploadResponse> {
        Box::pin(async move { self.post(self.url("/uploads/start"), &req).await })
    }

    fn upload_chunk(
        &self,
        upload_url: String,
        req: UploadChunkRequest,
    ) -> TransportFuture<'_, ChunkAck> {
        Box::pin(async move { self.post(self.url(&upload_url), &req).await })
    }

    fn complete_upload(
        &self,
        req: CompleteUploadRequest,
    ) -> TransportFuture<'_, CompleteUploadResponse> {
        Box::pin(async move { self.post(self.url("/uploads/complete"), &req).await })
    }

    fn cancel_upload(&self, req: CancelUploadRequest) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.send(self.url("/uploads/cancel"), &req).await?;
            Ok(())
        })
    }
}
