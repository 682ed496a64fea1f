//! Audit ledger types shared by the client and the server.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::CaptureMetadata;

/// Message prefix carried by every compliance rejection.
pub const COMPLIANCE_VIOLATION_PREFIX: &str = "21 CFR Part 11 compliance violation";

/// Fields that can never change once an audit entry exists.
pub const IMMUTABLE_FIELDS: [&str; 13] = [
    "attachmentId",
    "capturedAt",
    "serverTimestamp",
    "capturedById",
    "capturedByName",
    "latitude",
    "longitude",
    "accuracy",
    "barcode",
    "deviceInfo",
    "captureIndex",
    "imageHash",
    "action",
];

/// How an audit entry came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AuditAction {
    /// Explicit request from a capture session.
    #[default]
    Capture,
    /// Server-side fallback on attachment creation.
    CaptureAuto,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capture => "CAPTURE",
            Self::CaptureAuto => "CAPTURE_AUTO",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CAPTURE" => Ok(Self::Capture),
            "CAPTURE_AUTO" => Ok(Self::CaptureAuto),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// Values accepted by the ledger's create operation.
///
/// Everything is optional: the server fills `serverTimestamp`, the caller
/// identity, `action` and `metadata` when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateAuditEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_by_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AuditAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub metadata: Option<Value>,
}

impl CreateAuditEntry {
    /// Entry for an accepted capture: every metadata field plus the full
    /// metadata object as the extension blob.
    pub fn from_capture(attachment_id: i64, meta: &CaptureMetadata) -> Self {
        Self {
            attachment_id: Some(attachment_id),
            captured_at: Some(meta.timestamp.clone()),
            server_timestamp: None,
            captured_by_id: Some(meta.user_id),
            captured_by_name: Some(meta.user_name.clone()),
            latitude: meta.latitude,
            longitude: meta.longitude,
            accuracy: meta.accuracy,
            barcode: meta.barcode.clone(),
            device_info: Some(meta.device_info.clone()),
            capture_index: i32::try_from(meta.capture_index).ok(),
            image_hash: Some(meta.image_hash.clone()),
            action: Some(AuditAction::Capture),
            metadata: serde_json::to_value(meta).ok(),
        }
    }
}

/// A persisted, write-once audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditEntry {
    pub id: i64,
    pub attachment_id: Option<i64>,
    pub captured_at: Option<String>,
    pub server_timestamp: String,
    pub captured_by_id: Option<i64>,
    pub captured_by_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub barcode: Option<String>,
    pub device_info: Option<String>,
    pub capture_index: Option<i32>,
    pub image_hash: Option<String>,
    pub action: AuditAction,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub created_at: DateTime<Utc>,
}

/// Page metadata returned alongside a ledger listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListMeta {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_page: u32,
}

impl ListMeta {
    pub fn new(count: i64, page: u32, page_size: u32) -> Self {
        let total_page = if page_size == 0 {
            0
        } else {
            u32::try_from((count.max(0) as u64).div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        };
        Self {
            count,
            page,
            page_size,
            total_page,
        }
    }
}

/// One page of ledger entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditPage {
    pub data: Vec<AuditEntry>,
    pub meta: ListMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        assert_eq!(
            serde_json::to_value(AuditAction::CaptureAuto).unwrap(),
            "CAPTURE_AUTO"
        );
        let parsed: AuditAction = serde_json::from_str("\"CAPTURE\"").unwrap();
        assert_eq!(parsed, AuditAction::Capture);
        assert_eq!("CAPTURE_AUTO".parse::<AuditAction>(), Ok(AuditAction::CaptureAuto));
        assert!("DELETE".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_immutable_field_set() {
        assert_eq!(IMMUTABLE_FIELDS.len(), 13);
        assert!(IMMUTABLE_FIELDS.contains(&"imageHash"));
        assert!(!IMMUTABLE_FIELDS.contains(&"metadata"));
    }

    #[test]
    fn test_from_capture_carries_full_metadata() {
        let meta = CaptureMetadata {
            timestamp: "2026-02-17T10:00:00.000Z".into(),
            user_id: 3,
            user_name: "operator".into(),
            latitude: Some(48.85),
            longitude: Some(2.35),
            accuracy: Some(12.0),
            barcode: None,
            device_info: "bench".into(),
            capture_index: 2,
            image_hash: "cd".repeat(32),
        };

        let entry = CreateAuditEntry::from_capture(99, &meta);
        assert_eq!(entry.attachment_id, Some(99));
        assert_eq!(entry.captured_at.as_deref(), Some("2026-02-17T10:00:00.000Z"));
        assert_eq!(entry.capture_index, Some(2));
        assert_eq!(entry.action, Some(AuditAction::Capture));
        assert!(entry.server_timestamp.is_none());
        let blob = entry.metadata.unwrap();
        assert_eq!(blob["imageHash"], meta.image_hash);
        assert_eq!(blob["latitude"], 48.85);
    }

    #[test]
    fn test_create_entry_skips_absent_fields() {
        let json = serde_json::to_value(CreateAuditEntry {
            barcode: Some("LOT-1".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"barcode": "LOT-1"}));
    }

    #[test]
    fn test_list_meta_total_pages() {
        assert_eq!(ListMeta::new(0, 1, 20).total_page, 0);
        assert_eq!(ListMeta::new(20, 1, 20).total_page, 1);
        assert_eq!(ListMeta::new(21, 1, 20).total_page, 2);
    }
}
