//! Write-once enforcement for the audit ledger.
//!
//! [`ComplianceGate`] subscribes to the ledger's `BeforeUpdate` and
//! `BeforeDestroy` events. Every storage path emits those events before
//! writing, so the refusal holds for callers that never touch the HTTP API.

use async_trait::async_trait;
use attesta_core::IMMUTABLE_FIELDS;

use crate::events::{HookError, PersistenceEvent, Subscriber};

/// Reason given when an update changes audited fields.
pub fn immutable_fields_message(violated: &[&str]) -> String {
    format!("cannot modify immutable audit fields [{}]", violated.join(", "))
}

pub const DELETE_REFUSED: &str = "audit entries cannot be deleted";
pub const UPDATE_REFUSED: &str = "audit entries cannot be modified";

/// Rejects changes to immutable audit fields and every delete.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComplianceGate;

impl ComplianceGate {
    /// Immutable fields among `changed`, in the order they were given.
    pub fn violations(changed: &[String]) -> Vec<&str> {
        changed
            .iter()
            .map(String::as_str)
            .filter(|field| IMMUTABLE_FIELDS.contains(field))
            .collect()
    }
}

#[async_trait]
impl Subscriber for ComplianceGate {
    fn name(&self) -> &str {
        "compliance-gate"
    }

    async fn handle(&self, event: &PersistenceEvent) -> Result<(), HookError> {
        match event {
            PersistenceEvent::BeforeUpdate { id, changed, .. } => {
                let violated = Self::violations(changed);
                if violated.is_empty() {
                    return Ok(());
                }
                tracing::warn!(id, fields = ?violated, "Blocked update of immutable audit fields");
                Err(HookError::ComplianceViolation(immutable_fields_message(
                    &violated,
                )))
            }
            PersistenceEvent::BeforeDestroy { id, .. } => {
                tracing::warn!(id, "Blocked delete of audit entry");
                Err(HookError::ComplianceViolation(DELETE_REFUSED.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(changed: &[&str]) -> PersistenceEvent {
        PersistenceEvent::BeforeUpdate {
            collection: "captureAudit".into(),
            id: 7,
            changed: changed.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_every_immutable_field_is_guarded() {
        for field in IMMUTABLE_FIELDS {
            let err = ComplianceGate.handle(&update(&[field])).await.unwrap_err();
            assert!(matches!(err, HookError::ComplianceViolation(_)), "{field}");
            assert!(err.to_string().contains(field));
        }
    }

    #[tokio::test]
    async fn test_violation_names_all_offending_fields() {
        let err = ComplianceGate
            .handle(&update(&["metadata", "imageHash", "barcode"]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "21 CFR Part 11 compliance violation: cannot modify immutable audit fields [imageHash, barcode]"
        );
    }

    #[tokio::test]
    async fn test_metadata_only_update_passes() {
        assert!(ComplianceGate.handle(&update(&["metadata"])).await.is_ok());
        assert!(ComplianceGate.handle(&update(&[])).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_always_refused() {
        let event = PersistenceEvent::BeforeDestroy {
            collection: "captureAudit".into(),
            id: 1,
        };
        let err = ComplianceGate.handle(&event).await.unwrap_err();
        assert!(err.to_string().starts_with("21 CFR Part 11 compliance violation"));
    }
}
