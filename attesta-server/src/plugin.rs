//! Capture plugin lifecycle.

use std::sync::Arc;

use crate::attachments::ATTACHMENTS_COLLECTION;
use crate::auto_audit::AutoAudit;
use crate::compliance::ComplianceGate;
use crate::events::EventKind;
use crate::field::CaptureFieldType;
use crate::host::PluginContext;
use crate::ledger::{AuditStore, StoreError, AUDIT_COLLECTION};

pub struct CapturePlugin {
    ledger: Arc<AuditStore>,
    default_max_captures: u32,
}

impl CapturePlugin {
    pub fn new(ledger: Arc<AuditStore>, default_max_captures: u32) -> Self {
        Self {
            ledger,
            default_max_captures,
        }
    }

    /// Register the `capture` field type.
    pub fn before_load(&self, ctx: &PluginContext) {
        ctx.field_types
            .register(Arc::new(CaptureFieldType::new(self.default_max_captures)));
    }

    /// Install the compliance gate on the ledger and the auto-audit hook on
    /// the attachment store.
    pub fn load(&self, ctx: &PluginContext) {
        let gate = Arc::new(ComplianceGate);
        ctx.events
            .subscribe(AUDIT_COLLECTION, EventKind::BeforeUpdate, gate.clone());
        ctx.events
            .subscribe(AUDIT_COLLECTION, EventKind::BeforeDestroy, gate);
        ctx.events.subscribe(
            ATTACHMENTS_COLLECTION,
            EventKind::AfterCreate,
            Arc::new(AutoAudit::new(Arc::downgrade(&self.ledger))),
        );
        tracing::info!(
            persistent = self.ledger.is_persistent(),
            "Capture plugin loaded"
        );
    }

    /// Verify the ledger storage is reachable.
    pub async fn install(&self) -> Result<(), StoreError> {
        self.ledger.check_health().await?;
        tracing::info!("Capture plugin installed");
        Ok(())
    }

    /// Ledger storage is never dropped.
    pub fn remove(&self) {
        tracing::warn!(
            collection = AUDIT_COLLECTION,
            "Capture plugin removed. Audit data retained for compliance"
        );
    }
}
