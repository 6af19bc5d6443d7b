//! Upload orchestration for FanVault.
//!
//! Wires the session manager, the upload queue and the local library
//! together behind an [`UploaderHandle`]: validates requests, admits uploads
//! up to the concurrency limit, retries failed attempts with backoff and
//! records every outcome in history.

mod backoff;
mod config;
mod error;
mod events;
mod http;
mod orchestrator;
mod validation;

pub use backoff::RetryConfig;
pub use config::{CONFIG_FILE_NAME, UploaderConfig, default_config_path};
pub use error::UploaderError;
pub use events::UploadEvent;
pub use http::HttpTransport;
pub use orchestrator::UploaderHandle;
pub use validation::{
    MAX_DESCRIPTION_LEN, MAX_TAGS, MAX_TITLE_LEN, ValidationError, ValidationReport,
    validate_upload,
};
