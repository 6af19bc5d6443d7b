use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fanvault_protocol::{ContentMetadata, UploadId};

use crate::LibraryError;
use crate::draft::ContentDraft;
use crate::history::{HistoryStatus, UploadHistoryItem};
use crate::stats::UploadStatistics;

const DRAFTS_FILE: &str = "drafts.json";
const HISTORY_FILE: &str = "history.json";
const STATISTICS_FILE: &str = "statistics.json";

/// Drafts, upload history and statistics, each kept in one JSON file under
/// a data directory.
///
/// Collections are loaded wholesale on [`open`](Self::open) and each file is
/// rewritten wholesale when its collection changes. A failed write leaves
/// the in-memory collection as it was.
pub struct Library {
    dir: PathBuf,
    drafts: RwLock<Vec<ContentDraft>>,
    /// Drafts deleted during this run. Autosaves never bring them back.
    deleted_drafts: RwLock<HashSet<Uuid>>,
    history: RwLock<Vec<UploadHistoryItem>>,
    stats: RwLock<UploadStatistics>,
}

impl Library {
    /// Loads the library from `dir`, creating nothing until the first write.
    ///
    /// Missing statistics, or statistics whose counters disagree with the
    /// history, are recomputed from history and written back.
    pub fn open(dir: impl Into<PathBuf>, storage_quota: u64) -> Result<Self, LibraryError> {
        let dir = dir.into();
        let drafts: Vec<ContentDraft> = load_json(&dir.join(DRAFTS_FILE))?.unwrap_or_default();
        let history: Vec<UploadHistoryItem> =
            load_json(&dir.join(HISTORY_FILE))?.unwrap_or_default();
        let stored: Option<UploadStatistics> = load_json(&dir.join(STATISTICS_FILE))?;

        let recomputed = UploadStatistics::from_history(&history, storage_quota);
        let stats = match stored {
            Some(mut s) if s.is_consistent_with(&history) => {
                s.storage_quota = storage_quota;
                s
            }
            Some(_) => {
                warn!("statistics disagree with history, recomputing");
                write_json(&dir.join(STATISTICS_FILE), &recomputed)?;
                recomputed
            }
            None if history.is_empty() => recomputed,
            None => {
                info!("statistics missing, recomputing from history");
                write_json(&dir.join(STATISTICS_FILE), &recomputed)?;
                recomputed
            }
        };

        debug!(
            drafts = drafts.len(),
            history = history.len(),
            "library loaded from {:?}", dir
        );
        Ok(Self {
            dir,
            drafts: RwLock::new(drafts),
            deleted_drafts: RwLock::new(HashSet::new()),
            history: RwLock::new(history),
            stats: RwLock::new(stats),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // -- drafts -------------------------------------------------------------

    /// Inserts or supersedes a draft. An existing draft with the same id
    /// keeps its `created_at`.
    pub fn save_draft(&self, draft: ContentDraft) -> Result<ContentDraft, LibraryError> {
        let mut drafts = self.drafts.write().unwrap();
        let saved = self.write_draft(&mut drafts, draft)?;
        self.deleted_drafts.write().unwrap().remove(&saved.id);
        Ok(saved)
    }

    /// Like [`save_draft`](Self::save_draft), but skips drafts deleted since
    /// the library was opened. Returns `None` when skipped.
    pub fn autosave_draft(&self, draft: ContentDraft) -> Result<Option<ContentDraft>, LibraryError> {
        let mut drafts = self.drafts.write().unwrap();
        if self.deleted_drafts.read().unwrap().contains(&draft.id) {
            debug!(draft = %draft.id, "autosave of deleted draft skipped");
            return Ok(None);
        }
        self.write_draft(&mut drafts, draft).map(Some)
    }

    fn write_draft(
        &self,
        drafts: &mut Vec<ContentDraft>,
        mut draft: ContentDraft,
    ) -> Result<ContentDraft, LibraryError> {
        let mut updated = drafts.clone();
        match updated.iter_mut().find(|d| d.id == draft.id) {
            Some(existing) => {
                draft.created_at = existing.created_at;
                *existing = draft.clone();
            }
            None => updated.push(draft.clone()),
        }
        write_json(&self.dir.join(DRAFTS_FILE), &updated)?;
        *drafts = updated;
        debug!(draft = %draft.id, auto = draft.auto_saved, "draft saved");
        Ok(draft)
    }

    /// Removes a draft. Returns whether it existed.
    ///
    /// Pending autosaves of the draft are dropped when they come due.
    pub fn delete_draft(&self, id: Uuid) -> Result<bool, LibraryError> {
        let mut drafts = self.drafts.write().unwrap();
        if !drafts.iter().any(|d| d.id == id) {
            self.deleted_drafts.write().unwrap().insert(id);
            return Ok(false);
        }
        let remaining: Vec<ContentDraft> = drafts.iter().filter(|d| d.id != id).cloned().collect();
        write_json(&self.dir.join(DRAFTS_FILE), &remaining)?;
        *drafts = remaining;
        self.deleted_drafts.write().unwrap().insert(id);
        debug!(draft = %id, "draft deleted");
        Ok(true)
    }

    pub fn draft(&self, id: Uuid) -> Option<ContentDraft> {
        self.drafts
            .read()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// All drafts, most recently updated first.
    pub fn drafts(&self) -> Vec<ContentDraft> {
        let mut drafts = self.drafts.read().unwrap().clone();
        drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        drafts
    }

    // -- history ------------------------------------------------------------

    /// Appends an outcome and folds it into the statistics.
    pub fn record_outcome(
        &self,
        item: UploadHistoryItem,
    ) -> Result<UploadStatistics, LibraryError> {
        let mut history = self.history.write().unwrap();
        let mut stats = self.stats.write().unwrap();

        let mut updated = stats.clone();
        updated.record(&item);
        let (upload_id, status) = (item.upload_id, item.status);

        history.push(item);
        let written = write_json(&self.dir.join(HISTORY_FILE), &*history)
            .and_then(|()| write_json(&self.dir.join(STATISTICS_FILE), &updated));
        if let Err(e) = written {
            history.pop();
            return Err(e);
        }
        *stats = updated;

        info!(upload_id = %upload_id, status = ?status, "recorded upload outcome");
        Ok(stats.clone())
    }

    /// Every history entry, oldest first.
    pub fn history(&self) -> Vec<UploadHistoryItem> {
        self.history.read().unwrap().clone()
    }

    /// Replaces the metadata of the completed entry for `upload_id`.
    pub fn update_history_metadata(
        &self,
        upload_id: UploadId,
        metadata: ContentMetadata,
    ) -> Result<UploadHistoryItem, LibraryError> {
        let mut history = self.history.write().unwrap();
        let mut stats = self.stats.write().unwrap();
        let index = history
            .iter()
            .rposition(|h| h.upload_id == upload_id && h.status == HistoryStatus::Completed)
            .ok_or(LibraryError::HistoryNotFound(upload_id))?;

        let mut edited = history.clone();
        let category_changed = edited[index].metadata.category != metadata.category;
        edited[index].metadata = metadata;
        write_json(&self.dir.join(HISTORY_FILE), &edited)?;

        // The category breakdown depends on metadata; keep it in sync.
        if category_changed {
            let recomputed = UploadStatistics::from_history(&edited, stats.storage_quota);
            if let Err(e) = write_json(&self.dir.join(STATISTICS_FILE), &recomputed) {
                // Put the previous history file back so disk matches memory.
                if let Err(restore) = write_json(&self.dir.join(HISTORY_FILE), &*history) {
                    warn!(error = %restore, "cannot restore history after failed edit");
                }
                return Err(e);
            }
            *stats = recomputed;
        }

        let updated = edited[index].clone();
        *history = edited;
        debug!(upload_id = %upload_id, "history metadata updated");
        Ok(updated)
    }

    // -- statistics ---------------------------------------------------------

    pub fn statistics(&self) -> UploadStatistics {
        self.stats.read().unwrap().clone()
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LibraryError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)?;
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Writes `value` to a temporary sibling and renames it over `path`.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), LibraryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
