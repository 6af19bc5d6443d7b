//! Domain and wire types shared by the FanVault upload crates.
//!
//! `types` holds the caller-facing records (media references and content
//! metadata); `messages` holds the JSON payloads exchanged with the remote
//! upload service.

pub mod messages;
pub mod types;

pub use types::{
    Category, ContentFlags, ContentMetadata, MediaFile, Pricing, PricingKind, UploadId,
    Visibility, detect_mime_type, parse_tags,
};
