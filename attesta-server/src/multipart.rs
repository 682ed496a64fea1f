//! Attachment upload form.
//!
//! `POST /api/attachments` takes a `file` part plus an optional `filename`
//! text part. The override wins over the part's own filename so clients that
//! cannot set one (some camera bridges) still produce `capture_*` names.

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::validation::{
    validate_content_type, validate_file_size, validate_filename, FALLBACK_CONTENT_TYPE,
};

const FILE_PART: &str = "file";
const FILENAME_PART: &str = "filename";
const DEFAULT_FILENAME: &str = "upload.bin";

/// A validated upload, ready for the attachment store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Lowercased Content-Type of the file part.
    pub mimetype: String,
}

#[derive(Debug, Default)]
struct Parts {
    bytes: Option<Vec<u8>>,
    part_filename: Option<String>,
    content_type: Option<String>,
    filename_override: Option<String>,
}

impl AttachmentUpload {
    /// Read the form, checking content type and size as the file streams in.
    /// Unknown parts are skipped.
    pub async fn from_multipart(
        multipart: &mut Multipart,
        max_file_size: usize,
    ) -> Result<Self, ApiError> {
        let mut parts = Parts::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {e}")))?
        {
            match field.name() {
                Some(FILE_PART) => {
                    let content_type = field.content_type().map(str::to_string);
                    validate_content_type(content_type.as_deref())?;
                    parts.part_filename = field.file_name().map(str::to_string);
                    parts.content_type = content_type;

                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                    validate_file_size(data.len(), max_file_size)?;
                    parts.bytes = Some(data.to_vec());
                }
                Some(FILENAME_PART) => {
                    let value = field.text().await.map_err(|e| {
                        ApiError::bad_request(format!("Failed to read field '{FILENAME_PART}': {e}"))
                    })?;
                    parts.filename_override = Some(value);
                }
                _ => {}
            }
        }

        parts.finish()
    }
}

impl Parts {
    fn finish(self) -> Result<AttachmentUpload, ApiError> {
        let bytes = self.bytes.ok_or_else(|| {
            ApiError::bad_request("No file provided. Use 'file' field in multipart form.")
        })?;

        let filename = [self.filename_override, self.part_filename]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        validate_filename(&filename)?;

        let mimetype = self
            .content_type
            .as_deref()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_lowercase();

        Ok(AttachmentUpload {
            bytes,
            filename,
            mimetype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(part_filename: Option<&str>, filename_override: Option<&str>) -> Parts {
        Parts {
            bytes: Some(vec![0xFF, 0xD8]),
            part_filename: part_filename.map(str::to_string),
            content_type: Some("IMAGE/JPEG".to_string()),
            filename_override: filename_override.map(str::to_string),
        }
    }

    #[test]
    fn test_override_wins_over_part_filename() {
        let upload = parts(Some("blob"), Some("capture_1_1.jpg")).finish().unwrap();
        assert_eq!(upload.filename, "capture_1_1.jpg");
        assert_eq!(upload.mimetype, "image/jpeg");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let upload = parts(Some("photo.jpg"), Some("  ")).finish().unwrap();
        assert_eq!(upload.filename, "photo.jpg");
    }

    #[test]
    fn test_default_filename() {
        let upload = parts(None, None).finish().unwrap();
        assert_eq!(upload.filename, DEFAULT_FILENAME);
    }

    #[test]
    fn test_missing_content_type_falls_back() {
        let mut p = parts(Some("a.bin"), None);
        p.content_type = None;
        assert_eq!(p.finish().unwrap().mimetype, FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_missing_file_part() {
        let p = Parts {
            bytes: None,
            ..parts(None, None)
        };
        assert!(matches!(p.finish(), Err(ApiError::BadRequest(_))));
    }
}
