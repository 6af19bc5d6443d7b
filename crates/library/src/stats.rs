use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fanvault_protocol::Category;

use crate::history::{HistoryStatus, UploadHistoryItem};

/// Default storage quota: 10 GiB.
pub const DEFAULT_STORAGE_QUOTA: u64 = 10 * 1024 * 1024 * 1024;

/// Per-category totals over completed uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub uploads: u64,
    pub bytes: u64,
}

/// Aggregate view of upload history.
///
/// Maintained incrementally with [`record`](Self::record) and recomputable
/// with [`from_history`](Self::from_history); both paths produce identical
/// values. Cancelled uploads are not counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatistics {
    pub total_uploads: u64,
    pub successful_uploads: u64,
    pub failed_uploads: u64,
    /// Bytes of completed uploads.
    pub total_data_uploaded: u64,
    /// Sum of processing times of completed uploads, in milliseconds.
    pub total_upload_time_ms: u64,
    #[serde(default)]
    pub category_breakdown: BTreeMap<Category, CategoryStats>,
    pub storage_quota: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upload_at: Option<DateTime<Utc>>,
}

impl UploadStatistics {
    pub fn new(storage_quota: u64) -> Self {
        Self {
            total_uploads: 0,
            successful_uploads: 0,
            failed_uploads: 0,
            total_data_uploaded: 0,
            total_upload_time_ms: 0,
            category_breakdown: BTreeMap::new(),
            storage_quota,
            last_upload_at: None,
        }
    }

    /// Recomputes statistics from the full history.
    pub fn from_history<'a>(
        items: impl IntoIterator<Item = &'a UploadHistoryItem>,
        storage_quota: u64,
    ) -> Self {
        let mut stats = Self::new(storage_quota);
        for item in items {
            stats.record(item);
        }
        stats
    }

    /// Folds one history entry into the counters.
    pub fn record(&mut self, item: &UploadHistoryItem) {
        match item.status {
            HistoryStatus::Completed => {
                self.total_uploads += 1;
                self.successful_uploads += 1;
                self.total_data_uploaded += item.file_size;
                self.total_upload_time_ms += item.processing_time_ms;
                let entry = self
                    .category_breakdown
                    .entry(item.metadata.category)
                    .or_default();
                entry.uploads += 1;
                entry.bytes += item.file_size;
                self.last_upload_at = Some(
                    self.last_upload_at
                        .map_or(item.uploaded_at, |t| t.max(item.uploaded_at)),
                );
            }
            HistoryStatus::Failed => {
                self.total_uploads += 1;
                self.failed_uploads += 1;
            }
            HistoryStatus::Cancelled => {}
        }
    }

    /// Average processing time of completed uploads, in milliseconds.
    pub fn average_upload_time_ms(&self) -> u64 {
        self.total_upload_time_ms
            .checked_div(self.successful_uploads)
            .unwrap_or(0)
    }

    /// Fraction of counted uploads that completed, 0.0 to 1.0.
    pub fn success_rate(&self) -> f64 {
        if self.total_uploads == 0 {
            return 0.0;
        }
        self.successful_uploads as f64 / self.total_uploads as f64
    }

    /// Category with the most completed uploads. Ties go to the category
    /// listed first in [`Category::ALL`].
    pub fn most_used_category(&self) -> Option<Category> {
        let mut best: Option<(Category, u64)> = None;
        for category in Category::ALL {
            let Some(stats) = self.category_breakdown.get(&category) else {
                continue;
            };
            if best.is_none_or(|(_, n)| stats.uploads > n) {
                best = Some((category, stats.uploads));
            }
        }
        best.map(|(c, _)| c)
    }

    pub fn storage_used(&self) -> u64 {
        self.total_data_uploaded
    }

    pub fn storage_remaining(&self) -> u64 {
        self.storage_quota.saturating_sub(self.total_data_uploaded)
    }

    /// Whether the counters agree with a recomputation from `items`.
    pub fn is_consistent_with<'a>(
        &self,
        items: impl IntoIterator<Item = &'a UploadHistoryItem>,
    ) -> bool {
        *self == Self::from_history(items, self.storage_quota)
    }
}

impl Default for UploadStatistics {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_QUOTA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fanvault_protocol::{ContentMetadata, UploadId};

    fn entry(status: HistoryStatus, category: Category, size: u64, ms: u64) -> UploadHistoryItem {
        let mut metadata = ContentMetadata::new("Clip");
        metadata.category = category;
        UploadHistoryItem {
            upload_id: UploadId::new(),
            content_id: None,
            file_name: "clip.mp4".into(),
            metadata,
            status,
            uploaded_at: Utc::now(),
            processing_time_ms: ms,
            file_size: size,
            error: None,
        }
    }

    fn sample_history() -> Vec<UploadHistoryItem> {
        vec![
            entry(HistoryStatus::Completed, Category::Fitness, 1000, 300),
            entry(HistoryStatus::Failed, Category::Video, 5000, 100),
            entry(HistoryStatus::Completed, Category::Video, 2000, 400),
            entry(HistoryStatus::Cancelled, Category::Art, 7000, 50),
            entry(HistoryStatus::Completed, Category::Fitness, 500, 201),
        ]
    }

    #[test]
    fn incremental_equals_recompute() {
        let history = sample_history();
        let mut incremental = UploadStatistics::new(1_000_000);
        for item in &history {
            incremental.record(item);
        }
        let recomputed = UploadStatistics::from_history(&history, 1_000_000);

        assert_eq!(incremental, recomputed);
        assert_eq!(incremental.total_uploads, 4);
        assert_eq!(incremental.successful_uploads, 3);
        assert_eq!(incremental.failed_uploads, 1);
        assert_eq!(incremental.total_data_uploaded, 3500);
        assert!(incremental.is_consistent_with(&history));
    }

    #[test]
    fn cancelled_uploads_not_counted() {
        let mut stats = UploadStatistics::default();
        stats.record(&entry(HistoryStatus::Cancelled, Category::Art, 100, 10));
        assert_eq!(stats, UploadStatistics::default());
    }

    #[test]
    fn average_and_rate() {
        let stats = UploadStatistics::from_history(&sample_history(), 0);
        // (300 + 400 + 201) / 3
        assert_eq!(stats.average_upload_time_ms(), 300);
        assert!((stats.success_rate() - 0.75).abs() < 1e-9);
        assert_eq!(UploadStatistics::default().average_upload_time_ms(), 0);
        assert_eq!(UploadStatistics::default().success_rate(), 0.0);
    }

    #[test]
    fn most_used_category_and_breakdown() {
        let stats = UploadStatistics::from_history(&sample_history(), 0);
        assert_eq!(stats.most_used_category(), Some(Category::Fitness));
        assert_eq!(
            stats.category_breakdown[&Category::Fitness],
            CategoryStats {
                uploads: 2,
                bytes: 1500
            }
        );
        // Failed and cancelled entries stay out of the breakdown.
        assert!(!stats.category_breakdown.contains_key(&Category::Art));
        assert_eq!(UploadStatistics::default().most_used_category(), None);
    }

    #[test]
    fn most_used_category_tie_prefers_listing_order() {
        let history = vec![
            entry(HistoryStatus::Completed, Category::Music, 1, 1),
            entry(HistoryStatus::Completed, Category::Photo, 1, 1),
        ];
        let stats = UploadStatistics::from_history(&history, 0);
        assert_eq!(stats.most_used_category(), Some(Category::Photo));
    }

    #[test]
    fn quota_usage() {
        let stats = UploadStatistics::from_history(&sample_history(), 3000);
        assert_eq!(stats.storage_used(), 3500);
        assert_eq!(stats.storage_remaining(), 0);
    }

    #[test]
    fn last_upload_tracks_latest_completion() {
        let mut older = entry(HistoryStatus::Completed, Category::Photo, 1, 1);
        older.uploaded_at = Utc::now() - Duration::days(2);
        let newer = entry(HistoryStatus::Completed, Category::Photo, 1, 1);

        let stats = UploadStatistics::from_history([&newer, &older], 0);
        assert_eq!(stats.last_upload_at, Some(newer.uploaded_at));
    }

    #[test]
    fn json_roundtrip_with_category_keys() {
        let stats = UploadStatistics::from_history(&sample_history(), 42);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"fitness\""));
        let parsed: UploadStatistics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }
}
