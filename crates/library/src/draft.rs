use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fanvault_protocol::{ContentMetadata, MediaFile};

/// Target resolution for server-side video transcoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoQuality {
    #[default]
    Original,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "480p")]
    Sd480,
}

/// How the server should process the media after upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    #[serde(default = "default_true")]
    pub generate_thumbnail: bool,
    #[serde(default)]
    pub video_quality: VideoQuality,
    /// Remove GPS and device tags from images.
    #[serde(default = "default_true")]
    pub strip_location: bool,
    #[serde(default)]
    pub watermark: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            generate_thumbnail: true,
            video_quality: VideoQuality::Original,
            strip_location: true,
            watermark: false,
        }
    }
}

/// A persisted, not-yet-submitted content edit paired with its media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDraft {
    pub id: Uuid,
    pub media: MediaFile,
    pub metadata: ContentMetadata,
    #[serde(default)]
    pub processing: ProcessingOptions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Written by the autosaver rather than an explicit save.
    #[serde(default)]
    pub auto_saved: bool,
}

impl ContentDraft {
    pub fn new(media: MediaFile, metadata: ContentMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            media,
            metadata,
            processing: ProcessingOptions::default(),
            created_at: now,
            updated_at: now,
            auto_saved: false,
        }
    }
}
