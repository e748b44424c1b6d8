//! Synchronous upload validation.
//!
//! Every check here runs before a session row exists, so a rejected upload
//! leaves no trace in the store or on disk.

use crate::error::CoreError;

/// File extensions accepted for uploaded images, lowercase.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Maximum length of the opaque `user_token` field.
pub const MAX_TOKEN_LEN: usize = 255;

/// Validate an uploaded image and return its normalized (lowercase)
/// extension.
///
/// Checks, in order:
/// 1. a filename with an extension from [`ALLOWED_EXTENSIONS`] is present;
/// 2. the payload is non-empty and at most `max_bytes`;
/// 3. the bytes decode as an image.
///
/// The decode check is what catches corrupt files and payloads whose
/// extension lies about their content.
pub fn validate_image_upload(
    filename: Option<&str>,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<String, CoreError> {
    let filename = filename
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CoreError::Validation("No filename provided".into()))?;

    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid file type. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

    if bytes.is_empty() {
        return Err(CoreError::Validation("Empty file".into()));
    }
    if bytes.len() > max_bytes {
        return Err(CoreError::Validation(format!(
            "File too large. Max: {} MB",
            max_bytes / (1024 * 1024)
        )));
    }

    image::load_from_memory(bytes)
        .map_err(|_| CoreError::Validation("File is not a valid image".into()))?;

    Ok(ext)
}

/// Validate the opaque caller-supplied token: non-empty, at most
/// [`MAX_TOKEN_LEN`] characters. The token is an identifier, not a
/// credential — no identity check happens here or anywhere else.
pub fn validate_user_token(token: &str) -> Result<(), CoreError> {
    if token.trim().is_empty() {
        return Err(CoreError::Validation("user_token must not be empty".into()));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(CoreError::Validation(format!(
            "user_token must be at most {MAX_TOKEN_LEN} characters"
        )));
    }
    Ok(())
}
