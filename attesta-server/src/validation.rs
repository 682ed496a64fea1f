//! Checks applied to attachment uploads before they reach the store.

use crate::error::ApiError;

const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "application/pdf", "application/octet-stream"];

/// Recorded when the file part declares no Content-Type.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Case-insensitive. An undeclared type passes and is stored as binary.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    let Some(declared) = content_type else {
        return Ok(());
    };
    let lowered = declared.to_ascii_lowercase();
    if ALLOWED_MIME_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return Ok(());
    }
    Err(ApiError::bad_request(format!(
        "Unsupported Content-Type '{declared}', expected an image, a PDF or binary data"
    )))
}

pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    const MB: usize = 1024 * 1024;
    if size <= max_size {
        return Ok(());
    }
    Err(ApiError::bad_request(format!(
        "File too large: {} MB, limit is {} MB",
        size.div_ceil(MB),
        max_size / MB
    )))
}

/// Rejects empty names and anything that looks like a path.
pub fn validate_filename(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ApiError::bad_request(format!("Invalid filename: '{name}'")));
    }
    Ok(())
}
