//! Content-based upload validation.
//!
//! Uploads are sniffed by magic bytes, never trusted by extension or
//! declared content type. Rejection happens before any database row or
//! file is created.

use thiserror::Error;

/// Accepted audio containers. Both plain and `x-` MIME spellings appear
/// in the wild depending on the detector.
const ACCEPTED_AUDIO_MIMES: &[&str] = &[
    "audio/mpeg",
    "audio/flac",
    "audio/x-flac",
    "audio/wav",
    "audio/x-wav",
    "audio/ogg",
    "audio/aac",
];

const ACCEPTED_IMAGE_MIMES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Error, PartialEq)]
pub enum UploadValidationError {
    #[error("Empty file")]
    Empty,

    #[error("File too large (max {max_mib} MB)")]
    TooLarge { max_mib: u64 },

    #[error("Unknown file type")]
    UnknownType,

    #[error("Unsupported audio format: {0}")]
    UnsupportedAudio(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedImage(String),
}

/// Validate an audio upload. Returns the detected MIME type.
pub fn validate_audio_upload(
    bytes: &[u8],
    max_bytes: u64,
) -> Result<&'static str, UploadValidationError> {
    check_size(bytes, max_bytes)?;

    let kind = infer::get(bytes).ok_or(UploadValidationError::UnknownType)?;
    let mime = kind.mime_type();
    if !ACCEPTED_AUDIO_MIMES.contains(&mime) {
        return Err(UploadValidationError::UnsupportedAudio(mime.to_string()));
    }
    Ok(mime)
}

/// Validate an image upload (cover art). Returns the detected MIME type.
pub fn validate_image_upload(
    bytes: &[u8],
    max_bytes: u64,
) -> Result<&'static str, UploadValidationError> {
    check_size(bytes, max_bytes)?;

    let kind = infer::get(bytes).ok_or(UploadValidationError::UnknownType)?;
    let mime = kind.mime_type();
    if !ACCEPTED_IMAGE_MIMES.contains(&mime) {
        return Err(UploadValidationError::UnsupportedImage(mime.to_string()));
    }
    Ok(mime)
}

fn check_size(bytes: &[u8], max_bytes: u64) -> Result<(), UploadValidationError> {
    if bytes.is_empty() {
        return Err(UploadValidationError::Empty);
    }
    if bytes.len() as u64 > max_bytes {
        return Err(UploadValidationError::TooLarge {
            max_mib: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}
