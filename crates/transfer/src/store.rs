use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use fanvault_protocol::UploadId;

use crate::TransferError;
use crate::session::UploadSession;

/// Durable key-value storage for upload sessions, keyed by upload id.
pub trait SessionStore: Send + Sync {
    /// Inserts or replaces the record for `session.upload_id`.
    fn save(&self, session: &UploadSession) -> Result<(), TransferError>;

    fn load(&self, upload_id: UploadId) -> Result<Option<UploadSession>, TransferError>;

    /// Removes the record. Deleting a missing record is not an error.
    fn delete(&self, upload_id: UploadId) -> Result<(), TransferError>;

    /// Every stored record.
    fn list(&self) -> Result<Vec<UploadSession>, TransferError>;
}

// ---------------------------------------------------------------------------
// JsonFileSessionStore
// ---------------------------------------------------------------------------

/// One JSON file per session: `<dir>/upload_session_<uploadId>.json`.
///
/// Writes go to a temporary file that is renamed over the record, so a
/// crash mid-write leaves the previous record intact.
pub struct JsonFileSessionStore {
    dir: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, upload_id: UploadId) -> PathBuf {
        self.dir.join(format!("upload_session_{upload_id}.json"))
    }
}

impl SessionStore for JsonFileSessionStore {
    fn save(&self, session: &UploadSession) -> Result<(), TransferError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.record_path(session.upload_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(session)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        debug!(
            upload_id = %session.upload_id,
            chunks = session.uploaded_chunks.len(),
            "persisted session to {:?}", path
        );
        Ok(())
    }

    fn load(&self, upload_id: UploadId) -> Result<Option<UploadSession>, TransferError> {
        let path = self.record_path(upload_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&path)?;
        let session = serde_json::from_slice(&data)?;
        Ok(Some(session))
    }

    fn delete(&self, upload_id: UploadId) -> Result<(), TransferError> {
        match std::fs::remove_file(self.record_path(upload_id)) {
            Ok(()) => {
                debug!(upload_id = %upload_id, "deleted session record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<UploadSession>, TransferError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("upload_session_") && n.ends_with(".json"));
            if !is_record {
                continue;
            }
            let parsed = std::fs::read(&path)
                .map_err(TransferError::from)
                .and_then(|data| serde_json::from_slice(&data).map_err(TransferError::from));
            match parsed {
                Ok(session) => sessions.push(session),
                Err(e) => warn!("skipping unreadable session record {:?}: {e}", path),
            }
        }
        Ok(sessions)
    }
}

// ---------------------------------------------------------------------------
// MemorySessionStore
// ---------------------------------------------------------------------------

/// In-process store; contents are lost on exit.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<UploadId, UploadSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &UploadSession) -> Result<(), TransferError> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.upload_id, session.clone());
        Ok(())
    }

    fn load(&self, upload_id: UploadId) -> Result<Option<UploadSession>, TransferError> {
        Ok(self.sessions.read().unwrap().get(&upload_id).cloned())
    }

    fn delete(&self, upload_id: UploadId) -> Result<(), TransferError> {
        self.sessions.write().unwrap().remove(&upload_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<UploadSession>, TransferError> {
        Ok(self.sessions.read().unwrap().values().cloned().collect())
    }
}
