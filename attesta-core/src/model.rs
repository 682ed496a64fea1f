//! Capture data model shared by the session, the upload path and the server.

use serde::{Deserialize, Serialize};

/// MIME type of every snapshot produced by a capture session.
pub const CAPTURE_MIME_TYPE: &str = "image/jpeg";

/// Filename prefix recognized by the server's auto-audit fallback.
pub const CAPTURE_FILENAME_PREFIX: &str = "capture_";

/// Metadata assembled at snapshot time and recorded with every capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CaptureMetadata {
    /// ISO-8601 client clock at trigger time.
    pub timestamp: String,
    pub user_id: i64,
    pub user_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub barcode: Option<String>,
    pub device_info: String,
    /// 1-based, strictly increasing within one session.
    pub capture_index: u32,
    /// Lowercase hex SHA-256 of the uploaded bytes.
    pub image_hash: String,
}

/// A committed capture as stored in the owning record's capture array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CaptureMetadata>,
}

/// A snapshot awaiting accept or retake. Owned by the session.
#[derive(Clone, PartialEq)]
pub struct PendingCapture {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
    pub meta: CaptureMetadata,
}

impl PendingCapture {
    /// Promote to a committed record once the attachment store has the bytes.
    pub fn commit(&self, attachment: &StoredAttachment) -> CaptureRecord {
        CaptureRecord {
            id: Some(attachment.id),
            url: Some(attachment.url.clone()),
            filename: Some(attachment.filename.clone().unwrap_or_else(|| self.filename.clone())),
            title: attachment.title.clone(),
            meta: Some(self.meta.clone()),
        }
    }
}

impl std::fmt::Debug for PendingCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCapture")
            .field("bytes", &format_args!("[{} bytes]", self.bytes.len()))
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("meta", &self.meta)
            .finish()
    }
}

/// Reference returned by the attachment store after a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoredAttachment {
    pub id: i64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Snapshot filename: `capture_<unix-millis>_<captureIndex>.jpg`.
pub fn capture_filename(unix_millis: i64, capture_index: u32) -> String {
    format!("{CAPTURE_FILENAME_PREFIX}{unix_millis}_{capture_index}.jpg")
}
