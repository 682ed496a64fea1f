//! The accept flow: persist the binary, then record the audit entry.
//!
//! The two steps are ordered but not transactional. An upload failure aborts the
//! accept and nothing is recorded. An audit failure after a successful upload is
//! logged and reported in the [`AcceptOutcome`]; the binary is kept and the
//! server's auto-audit fallback covers the gap.

#[cfg(feature = "network")]
mod http;

#[cfg(feature = "network")]
pub use http::{HttpAttachmentUploader, HttpAuditClient, HttpClientConfig};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::audit::{AuditEntry, AuditPage, CreateAuditEntry};
use crate::error::{AuditClientError, UploadError};
use crate::model::{CaptureRecord, PendingCapture, StoredAttachment};

/// A file handed to the attachment store.
#[derive(Debug, Clone, Copy)]
pub struct UploadFile<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub mime_type: &'a str,
}

/// Binary attachment store capability.
#[async_trait]
pub trait AttachmentUploader: Send + Sync {
    async fn upload(&self, file: UploadFile<'_>) -> Result<StoredAttachment, UploadError>;
}

/// Audit ledger capability.
#[async_trait]
pub trait AuditClient: Send + Sync {
    async fn create_entry(&self, entry: &CreateAuditEntry) -> Result<AuditEntry, AuditClientError>;
}

/// Filters for reading the ledger back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort: Option<String>,
    pub attachment_id: Option<i64>,
    pub captured_by_id: Option<i64>,
    pub barcode: Option<String>,
    pub image_hash: Option<String>,
}

impl AuditListQuery {
    /// Query-string pairs using the ledger's camelCase parameter names.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.page {
            pairs.push(("page", v.to_string()));
        }
        if let Some(v) = self.page_size {
            pairs.push(("pageSize", v.to_string()));
        }
        if let Some(v) = &self.sort {
            pairs.push(("sort", v.clone()));
        }
        if let Some(v) = self.attachment_id {
            pairs.push(("attachmentId", v.to_string()));
        }
        if let Some(v) = self.captured_by_id {
            pairs.push(("capturedById", v.to_string()));
        }
        if let Some(v) = &self.barcode {
            pairs.push(("barcode", v.clone()));
        }
        if let Some(v) = &self.image_hash {
            pairs.push(("imageHash", v.clone()));
        }
        pairs
    }
}

/// Read access to the ledger, used by verification tooling.
#[async_trait]
pub trait AuditReader: Send + Sync {
    async fn get_entry(&self, id: i64) -> Result<AuditEntry, AuditClientError>;
    async fn list_entries(&self, query: &AuditListQuery) -> Result<AuditPage, AuditClientError>;
}

/// What happened to the audit step of an accept.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Recorded(AuditEntry),
    Failed(String),
    /// No audit client configured; only the server fallback applies.
    Skipped,
}

/// Result of a successful accept.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptOutcome {
    pub record: CaptureRecord,
    pub audit: AuditOutcome,
}

impl AcceptOutcome {
    pub fn audit_recorded(&self) -> bool {
        matches!(self.audit, AuditOutcome::Recorded(_))
    }
}

/// Runs upload then audit creation for an accepted capture.
#[derive(Clone)]
pub struct UploadCoordinator {
    uploader: Arc<dyn AttachmentUploader>,
    audit: Option<Arc<dyn AuditClient>>,
}

impl UploadCoordinator {
    pub fn new(uploader: Arc<dyn AttachmentUploader>, audit: Arc<dyn AuditClient>) -> Self {
        Self {
            uploader,
            audit: Some(audit),
        }
    }

    /// Upload only, relying on the server fallback for the audit entry.
    pub fn without_audit(uploader: Arc<dyn AttachmentUploader>) -> Self {
        Self {
            uploader,
            audit: None,
        }
    }

    #[instrument(level = "info", skip_all, fields(
        filename = %pending.filename,
        capture_index = pending.meta.capture_index
    ))]
    pub async fn accept(&self, pending: &PendingCapture) -> Result<AcceptOutcome, UploadError> {
        let stored = self
            .uploader
            .upload(UploadFile {
                bytes: &pending.bytes,
                filename: &pending.filename,
                mime_type: pending.mime_type,
            })
            .await?;

        if stored.url.is_empty() {
            return Err(UploadError::MissingUrl);
        }
        info!(attachment_id = stored.id, "Capture uploaded");

        let record = pending.commit(&stored);

        let audit = match &self.audit {
            None => AuditOutcome::Skipped,
            Some(client) => {
                let entry = CreateAuditEntry::from_capture(stored.id, &pending.meta);
                match client.create_entry(&entry).await {
                    Ok(created) => {
                        info!(audit_id = created.id, "Audit entry recorded");
                        AuditOutcome::Recorded(created)
                    }
                    Err(e) => {
                        warn!(error = %e, attachment_id = stored.id, "Audit entry creation failed, upload kept");
                        AuditOutcome::Failed(e.to_string())
                    }
                }
            }
        };

        Ok(AcceptOutcome { record, audit })
    }
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("audit", &self.audit.is_some())
            .finish()
    }
}
