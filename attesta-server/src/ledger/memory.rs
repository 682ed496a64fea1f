//! In-memory audit ledger used when no database is configured.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicI64, Ordering};

use attesta_core::AuditEntry;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;

use super::{AuditQuery, AuditSort, NewAuditEntry, StoreError};

#[derive(Debug)]
pub struct MemoryAuditStore {
    entries: DashMap<i64, AuditEntry>,
    next_id: AtomicI64,
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn insert(&self, entry: NewAuditEntry) -> AuditEntry {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = AuditEntry {
            id,
            attachment_id: entry.attachment_id,
            captured_at: entry.captured_at,
            server_timestamp: entry.server_timestamp,
            captured_by_id: entry.captured_by_id,
            captured_by_name: entry.captured_by_name,
            latitude: entry.latitude,
            longitude: entry.longitude,
            accuracy: entry.accuracy,
            barcode: entry.barcode,
            device_info: entry.device_info,
            capture_index: entry.capture_index,
            image_hash: entry.image_hash,
            action: entry.action,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.entries.insert(id, created.clone());
        created
    }

    pub fn find_by_id(&self, id: i64) -> Option<AuditEntry> {
        self.entries.get(&id).map(|e| e.value().clone())
    }

    pub fn find_and_count(&self, query: &AuditQuery) -> (Vec<AuditEntry>, i64) {
        let mut matching: Vec<AuditEntry> = self
            .entries
            .iter()
            .filter(|e| query.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();

        let sort = query.sort();
        matching.sort_by(|a, b| {
            let ord = compare(sort, a, b).then(a.id.cmp(&b.id));
            if sort.descending() {
                ord.reverse()
            } else {
                ord
            }
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.page_size() as usize)
            .collect();
        (page, total)
    }

    pub fn update_metadata(&self, id: i64, metadata: Value) -> Result<AuditEntry, StoreError> {
        let mut entry = self.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.metadata = metadata;
        Ok(entry.clone())
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

fn compare(sort: AuditSort, a: &AuditEntry, b: &AuditEntry) -> CmpOrdering {
    match sort {
        AuditSort::CreatedAt | AuditSort::CreatedAtDesc => a.created_at.cmp(&b.created_at),
        // NULLs sort last ascending, matching PostgreSQL
        AuditSort::CaptureIndex | AuditSort::CaptureIndexDesc => {
            match (a.capture_index, b.capture_index) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => CmpOrdering::Less,
                (None, Some(_)) => CmpOrdering::Greater,
                (None, None) => CmpOrdering::Equal,
            }
        }
        AuditSort::Id | AuditSort::IdDesc => CmpOrdering::Equal,
    }
}
