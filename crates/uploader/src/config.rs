//! Uploader configuration management.
//!
//! Configuration is stored as TOML inside the data directory:
//! - Linux: `$XDG_CONFIG_HOME/fanvault/config.toml` (`~/.config/fanvault`)
//! - Windows: `%APPDATA%/fanvault/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fanvault_library::DEFAULT_STORAGE_QUOTA;
use fanvault_transfer::{DEFAULT_CHUNK_SIZE, SessionConfig};

use crate::backoff::RetryConfig;
use crate::error::UploaderError;

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Base URL of the upload service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Directory holding sessions, drafts, history and statistics.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Uploads allowed in an active state at once.
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,

    /// Automatic attempts per upload before it is marked failed, and the
    /// bound on manual retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Preferred chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Extra immediate attempts per chunk before the attempt fails.
    #[serde(default)]
    pub chunk_retry_attempts: u32,

    /// Largest accepted file, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Accepted mime types. `type/*` matches a whole family.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,

    /// Bound on each request to the upload service, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Quiet period before a draft edit is written, in milliseconds.
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,

    #[serde(default = "default_storage_quota_bytes")]
    pub storage_quota_bytes: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_endpoint() -> String {
    "https://api.fanvault.app".into()
}

fn default_data_dir() -> PathBuf {
    platform_data_dir()
}

fn default_max_concurrent_uploads() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "image/heic",
        "video/mp4",
        "video/quicktime",
        "video/webm",
        "audio/mpeg",
        "audio/wav",
        "audio/aac",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_autosave_debounce_ms() -> u64 {
    1000
}

fn default_storage_quota_bytes() -> u64 {
    DEFAULT_STORAGE_QUOTA
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_token: None,
            data_dir: default_data_dir(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            max_retries: default_max_retries(),
            chunk_size: default_chunk_size(),
            chunk_retry_attempts: 0,
            max_file_size: default_max_file_size(),
            allowed_mime_types: default_allowed_mime_types(),
            request_timeout_secs: default_request_timeout_secs(),
            autosave_debounce_ms: default_autosave_debounce_ms(),
            storage_quota_bytes: default_storage_quota_bytes(),
            retry: RetryConfig::default(),
        }
    }
}

impl UploaderConfig {
    /// Loads configuration from `path`, or creates a default file there if
    /// it does not exist.
    pub fn load(path: &Path) -> Result<Self, UploaderError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: UploaderConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = UploaderConfig::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Rejects values that would make uploads meaningless.
    pub fn validate(&self) -> Result<(), UploaderError> {
        if self.chunk_size == 0 {
            return Err(UploaderError::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.max_concurrent_uploads == 0 {
            return Err(UploaderError::InvalidConfig(
                "max_concurrent_uploads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<(), UploaderError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Directory of persisted upload sessions.
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            chunk_size: self.chunk_size,
            request_timeout: self.request_timeout(),
            chunk_retry_attempts: self.chunk_retry_attempts,
        }
    }

    /// Whether `mime_type` matches an entry of `allowed_mime_types`.
    pub fn is_mime_type_allowed(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|allowed| {
            let allowed = allowed.trim().to_ascii_lowercase();
            match allowed.strip_suffix("/*") {
                Some(family) => mime_type
                    .split_once('/')
                    .is_some_and(|(t, sub)| t == family && !sub.is_empty()),
                None => allowed == mime_type,
            }
        })
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_config_path() -> PathBuf {
    platform_data_dir().join(CONFIG_FILE_NAME)
}

fn platform_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("fanvault")
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
            && !xdg.is_empty()
        {
            return PathBuf::from(xdg).join("fanvault");
        }
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".config").join("fanvault"),
            Err(_) => PathBuf::from("/tmp/fanvault"),
        }
    }
}
