//! Pre-flight checks run before an upload is queued.

use std::fmt;

use serde::Serialize;

use fanvault_protocol::{ContentMetadata, MediaFile, PricingKind};
use fanvault_transfer::validate_file_name;

use crate::config::UploaderConfig;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_TAGS: usize = 20;

/// One reason an upload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("file is empty")]
    EmptyFile,

    #[error("file is {size} bytes, the limit is {max}")]
    FileTooLarge { size: u64, max: u64 },

    #[error("unsupported file type: {mime_type}")]
    UnsupportedType { mime_type: String },

    #[error("unsafe file name: {name}")]
    UnsafeFileName { name: String },

    #[error("title is required")]
    MissingTitle,

    #[error("title is {len} characters, the limit is {max}")]
    TitleTooLong { len: usize, max: usize },

    #[error("description is {len} characters, the limit is {max}")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("{count} tags given, the limit is {max}")]
    TooManyTags { count: usize, max: usize },

    #[error("paid content needs a price above zero")]
    MissingPrice,

    #[error("subscription content needs a subscription tier")]
    MissingSubscriptionTier,
}

/// Every problem found with an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("valid");
        }
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// Checks a media file and its metadata against the configured limits.
///
/// Collects every problem instead of stopping at the first.
pub fn validate_upload(
    media: &MediaFile,
    metadata: &ContentMetadata,
    config: &UploaderConfig,
) -> ValidationReport {
    let mut errors = Vec::new();

    if media.size == 0 {
        errors.push(ValidationError::EmptyFile);
    } else if media.size > config.max_file_size {
        errors.push(ValidationError::FileTooLarge {
            size: media.size,
            max: config.max_file_size,
        });
    }

    if !config.is_mime_type_allowed(&media.mime_type) {
        errors.push(ValidationError::UnsupportedType {
            mime_type: media.mime_type.clone(),
        });
    }

    if validate_file_name(&media.name).is_err() {
        errors.push(ValidationError::UnsafeFileName {
            name: media.name.clone(),
        });
    }

    let title_len = metadata.title.trim().chars().count();
    if title_len == 0 {
        errors.push(ValidationError::MissingTitle);
    } else if title_len > MAX_TITLE_LEN {
        errors.push(ValidationError::TitleTooLong {
            len: title_len,
            max: MAX_TITLE_LEN,
        });
    }

    let description_len = metadata.description.chars().count();
    if description_len > MAX_DESCRIPTION_LEN {
        errors.push(ValidationError::DescriptionTooLong {
            len: description_len,
            max: MAX_DESCRIPTION_LEN,
        });
    }

    if metadata.tags.len() > MAX_TAGS {
        errors.push(ValidationError::TooManyTags {
            count: metadata.tags.len(),
            max: MAX_TAGS,
        });
    }

    match metadata.pricing.kind {
        PricingKind::Paid if metadata.pricing.amount == 0 => {
            errors.push(ValidationError::MissingPrice);
        }
        PricingKind::Subscription
            if metadata
                .pricing
                .subscription_tier
                .as_deref()
                .is_none_or(|t| t.trim().is_empty()) =>
        {
            errors.push(ValidationError::MissingSubscriptionTier);
        }
        _ => {}
    }

    ValidationReport::from_errors(errors)
}
