//! Server-side fallback audit on attachment creation.
//!
//! A capture snapshot that reaches the attachment store gets an audit entry
//! even if the client never calls the ledger. The client's own entry is not
//! deduplicated against this one, so an accepted capture normally produces
//! both a `CAPTURE` and a `CAPTURE_AUTO` entry.

use std::sync::Weak;

use async_trait::async_trait;
use attesta_core::model::CAPTURE_FILENAME_PREFIX;
use attesta_core::{AuditAction, CurrentUser};
use serde_json::{json, Value};

use crate::events::{HookError, PersistenceEvent, Subscriber};
use crate::ledger::{now_rfc3339, AuditStore, NewAuditEntry};

/// Display name recorded on automatic entries.
pub const AUTO_AUDIT_USER_NAME: &str = "System (auto-audit)";

/// Whether an attachment looks like a capture snapshot.
pub fn is_capture_attachment(mimetype: Option<&str>, filename: Option<&str>) -> bool {
    mimetype.is_some_and(|m| m.starts_with("image/"))
        && filename.is_some_and(|f| f.starts_with(CAPTURE_FILENAME_PREFIX))
}

/// Writes a `CAPTURE_AUTO` entry for every new capture attachment.
///
/// Holds the ledger weakly: the ledger owns the event bus this subscriber
/// is registered on.
pub struct AutoAudit {
    ledger: Weak<AuditStore>,
}

impl AutoAudit {
    pub fn new(ledger: Weak<AuditStore>) -> Self {
        Self { ledger }
    }

    fn entry_for(record: &Value, actor: Option<&CurrentUser>) -> Option<NewAuditEntry> {
        let mimetype = record.get("mimetype").and_then(Value::as_str);
        let filename = record.get("filename").and_then(Value::as_str);
        if !is_capture_attachment(mimetype, filename) {
            return None;
        }

        let now = now_rfc3339();
        Some(NewAuditEntry {
            attachment_id: record.get("id").and_then(Value::as_i64),
            captured_at: Some(now.clone()),
            server_timestamp: now,
            captured_by_id: actor.map(|u| u.id),
            captured_by_name: Some(AUTO_AUDIT_USER_NAME.to_string()),
            latitude: None,
            longitude: None,
            accuracy: None,
            barcode: None,
            device_info: None,
            capture_index: None,
            image_hash: None,
            action: AuditAction::CaptureAuto,
            metadata: json!({
                "mimetype": mimetype,
                "filename": filename,
                "size": record.get("size").cloned().unwrap_or(Value::Null),
                "autoCreated": true,
            }),
        })
    }
}

#[async_trait]
impl Subscriber for AutoAudit {
    fn name(&self) -> &str {
        "auto-audit"
    }

    async fn handle(&self, event: &PersistenceEvent) -> Result<(), HookError> {
        let PersistenceEvent::AfterCreate { record, actor, .. } = event else {
            return Ok(());
        };
        let Some(entry) = Self::entry_for(record, actor.as_ref()) else {
            return Ok(());
        };
        let Some(ledger) = self.ledger.upgrade() else {
            tracing::warn!("Audit ledger dropped, skipping auto-audit");
            return Ok(());
        };

        // Never fail the attachment create over the audit write.
        if let Err(e) = ledger.insert(entry).await {
            tracing::warn!(
                attachment_id = ?record.get("id"),
                error = %e,
                "Auto-audit entry not recorded"
            );
        }
        Ok(())
    }
}
