//! In-memory attachment store for development and tests.
//!
//! Production deployments put a real binary store in front of the ledger;
//! this one exists so the capture flow and the auto-audit hook can be
//! exercised end to end.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use attesta_core::{CurrentUser, StoredAttachment};
use dashmap::DashMap;
use serde_json::json;

use crate::events::{EventBus, HookError, PersistenceEvent};

/// Collection name used for attachment persistence events.
pub const ATTACHMENTS_COLLECTION: &str = "attachments";

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mimetype: String,
}

pub struct AttachmentStore {
    files: DashMap<i64, StoredFile>,
    next_id: AtomicI64,
    events: Arc<EventBus>,
}

impl AttachmentStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            files: DashMap::new(),
            next_id: AtomicI64::new(1),
            events,
        }
    }

    /// Store a file and emit `AfterCreate` for it.
    pub async fn create(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mimetype: &str,
        actor: Option<CurrentUser>,
    ) -> Result<StoredAttachment, HookError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let size = bytes.len();
        let title = filename
            .rsplit_once('.')
            .map_or(filename, |(stem, _)| stem)
            .to_string();
        let attachment = StoredAttachment {
            id,
            url: format!("/api/attachments/{id}"),
            filename: Some(filename.to_string()),
            title: Some(title),
        };

        self.files.insert(
            id,
            StoredFile {
                bytes,
                filename: filename.to_string(),
                mimetype: mimetype.to_string(),
            },
        );
        tracing::debug!(id, filename, mimetype, size, "Attachment stored");

        self.events
            .emit(&PersistenceEvent::AfterCreate {
                collection: ATTACHMENTS_COLLECTION.to_string(),
                record: json!({
                    "id": id,
                    "url": attachment.url,
                    "filename": filename,
                    "title": attachment.title,
                    "mimetype": mimetype,
                    "size": size,
                }),
                actor,
            })
            .await?;

        Ok(attachment)
    }

    pub fn get(&self, id: i64) -> Option<StoredFile> {
        self.files.get(&id).map(|f| f.value().clone())
    }
}
