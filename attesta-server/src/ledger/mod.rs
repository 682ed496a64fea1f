//! Audit ledger storage
//!
//! [`AuditStore`] is the single entry point for reading and writing capture
//! audit entries. It is backed by:
//! - **PostgreSQL** when `DATABASE_URL` is set; the migration adds row triggers
//!   that refuse updates of audited columns and every delete.
//! - **Memory** otherwise (development only, entries are lost on restart).
//!
//! Both backends share the same write path: updates and deletes emit
//! persistence events first, so the [`ComplianceGate`](crate::compliance::ComplianceGate)
//! sees them regardless of who calls.

mod memory;
mod postgres;

pub use memory::MemoryAuditStore;
pub use postgres::PostgresAuditStore;

use std::str::FromStr;
use std::sync::Arc;

use attesta_core::{
    AuditAction, AuditEntry, CreateAuditEntry, CurrentUser, COMPLIANCE_VIOLATION_PREFIX,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use utoipa::IntoParams;

use crate::events::{EventBus, HookError, PersistenceEvent};

/// Collection name used for ledger persistence events.
pub const AUDIT_COLLECTION: &str = "captureAudit";

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Audit entry {0} not found")]
    NotFound(i64),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error(transparent)]
    Rejected(#[from] HookError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if let Some(reason) = db.message().strip_prefix(COMPLIANCE_VIOLATION_PREFIX) {
                let reason = reason.trim_start_matches(':').trim();
                return Self::Rejected(HookError::ComplianceViolation(reason.to_string()));
            }
        }
        Self::Query(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(e.to_string())
    }
}

/// Sort order for listings. Wire values are `createdAt`, `-createdAt`,
/// `captureIndex`, `-captureIndex`, `id` and `-id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditSort {
    CreatedAt,
    #[default]
    CreatedAtDesc,
    CaptureIndex,
    CaptureIndexDesc,
    Id,
    IdDesc,
}

impl AuditSort {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::CreatedAt | Self::CreatedAtDesc => "created_at",
            Self::CaptureIndex | Self::CaptureIndexDesc => "capture_index",
            Self::Id | Self::IdDesc => "id",
        }
    }

    pub(crate) fn descending(self) -> bool {
        matches!(
            self,
            Self::CreatedAtDesc | Self::CaptureIndexDesc | Self::IdDesc
        )
    }
}

impl FromStr for AuditSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(Self::CreatedAt),
            "-createdAt" => Ok(Self::CreatedAtDesc),
            "captureIndex" => Ok(Self::CaptureIndex),
            "-captureIndex" => Ok(Self::CaptureIndexDesc),
            "id" => Ok(Self::Id),
            "-id" => Ok(Self::IdDesc),
            other => Err(format!("unsupported sort: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for AuditSort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Listing parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Page number (1-indexed)
    #[param(default = 1, minimum = 1)]
    pub page: Option<u32>,

    /// Items per page (max 100)
    #[param(default = 20, minimum = 1, maximum = 100)]
    pub page_size: Option<u32>,

    /// One of createdAt, -createdAt, captureIndex, -captureIndex, id, -id
    #[param(value_type = Option<String>, default = "-createdAt")]
    pub sort: Option<AuditSort>,

    pub attachment_id: Option<i64>,
    pub captured_by_id: Option<i64>,
    pub barcode: Option<String>,
    pub image_hash: Option<String>,

    /// CAPTURE or CAPTURE_AUTO
    #[param(value_type = Option<String>)]
    pub action: Option<AuditAction>,
}

impl AuditQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn sort(&self) -> AuditSort {
        self.sort.unwrap_or_default()
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.page_size())
    }

    /// Whether an entry passes every filter.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.attachment_id.map_or(true, |v| entry.attachment_id == Some(v))
            && self
                .captured_by_id
                .map_or(true, |v| entry.captured_by_id == Some(v))
            && self
                .barcode
                .as_deref()
                .map_or(true, |v| entry.barcode.as_deref() == Some(v))
            && self
                .image_hash
                .as_deref()
                .map_or(true, |v| entry.image_hash.as_deref() == Some(v))
            && self.action.map_or(true, |v| entry.action == v)
    }
}

/// A create request after server defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
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
    pub metadata: Value,
}

impl NewAuditEntry {
    /// Fill `serverTimestamp`, the caller identity, `action` and `metadata`
    /// where the request left them out.
    pub fn from_request(values: CreateAuditEntry, caller: Option<&CurrentUser>) -> Self {
        let server_timestamp = values
            .server_timestamp
            .filter(|ts| !ts.is_empty())
            .unwrap_or_else(now_rfc3339);
        let captured_by_id = values.captured_by_id.or(caller.map(|u| u.id));
        let captured_by_name = values
            .captured_by_name
            .filter(|name| !name.is_empty())
            .or_else(|| caller.map(|u| u.display_name().to_string()));

        Self {
            attachment_id: values.attachment_id,
            captured_at: values.captured_at,
            server_timestamp,
            captured_by_id,
            captured_by_name,
            latitude: values.latitude,
            longitude: values.longitude,
            accuracy: values.accuracy,
            barcode: values.barcode,
            device_info: values.device_info,
            capture_index: values.capture_index,
            image_hash: values.image_hash,
            action: values.action.unwrap_or_default(),
            metadata: values
                .metadata
                .filter(|m| !m.is_null())
                .unwrap_or_else(|| Value::Object(Map::new())),
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Storage backend
enum Backend {
    /// PostgreSQL storage (production)
    Postgres(PostgresAuditStore),
    /// In-memory storage (development fallback)
    Memory(MemoryAuditStore),
}

/// Append-only audit ledger.
pub struct AuditStore {
    backend: Backend,
    events: Arc<EventBus>,
}

impl AuditStore {
    /// Create a ledger with the in-memory backend (development only)
    pub fn in_memory(events: Arc<EventBus>) -> Self {
        tracing::warn!("Using in-memory audit ledger - entries will be lost on restart!");
        Self {
            backend: Backend::Memory(MemoryAuditStore::new()),
            events,
        }
    }

    /// Create a ledger with the PostgreSQL backend, running migrations
    pub async fn with_postgres(
        database_url: &str,
        max_connections: u32,
        events: Arc<EventBus>,
    ) -> Result<Self, StoreError> {
        let store = PostgresAuditStore::connect(database_url, max_connections).await?;
        Ok(Self {
            backend: Backend::Postgres(store),
            events,
        })
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, Backend::Postgres(_))
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Check database health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.check_health().await,
            Backend::Memory(_) => Ok(()),
        }
    }

    /// Append an entry.
    pub async fn insert(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let created = match &self.backend {
            Backend::Postgres(pg) => pg.insert(&entry).await?,
            Backend::Memory(mem) => mem.insert(entry),
        };
        tracing::info!(
            id = created.id,
            attachment_id = ?created.attachment_id,
            action = %created.action,
            "Audit entry recorded"
        );
        Ok(created)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<AuditEntry>, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.find_by_id(id).await,
            Backend::Memory(mem) => Ok(mem.find_by_id(id)),
        }
    }

    /// One page of entries matching `query`, with the total match count.
    pub async fn find_and_count(
        &self,
        query: &AuditQuery,
    ) -> Result<(Vec<AuditEntry>, i64), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.find_and_count(query).await,
            Backend::Memory(mem) => Ok(mem.find_and_count(query)),
        }
    }

    /// Apply a camelCase field patch to an entry.
    ///
    /// Emits `BeforeUpdate` with the fields whose value would change. Only
    /// `metadata` can pass the compliance gate.
    pub async fn update(
        &self,
        id: i64,
        changes: Map<String, Value>,
    ) -> Result<AuditEntry, StoreError> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        let changed = changed_fields(&current, &changes)?;

        self.events
            .emit(&PersistenceEvent::BeforeUpdate {
                collection: AUDIT_COLLECTION.to_string(),
                id,
                changed: changed.clone(),
            })
            .await?;

        if changed.is_empty() {
            return Ok(current);
        }
        // Anything else was refused above.
        let metadata = changes
            .get("metadata")
            .cloned()
            .unwrap_or(current.metadata);
        match &self.backend {
            Backend::Postgres(pg) => pg.update_metadata(id, &metadata).await,
            Backend::Memory(mem) => mem.update_metadata(id, metadata),
        }
    }

    /// Delete an entry. Refused by the compliance gate.
    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if self.find_by_id(id).await?.is_none() {
            return Err(StoreError::NotFound(id));
        }
        self.events
            .emit(&PersistenceEvent::BeforeDestroy {
                collection: AUDIT_COLLECTION.to_string(),
                id,
            })
            .await?;

        match &self.backend {
            Backend::Postgres(pg) => pg.delete(id).await,
            Backend::Memory(mem) => mem.delete(id),
        }
    }
}

/// camelCase names of the fields in `changes` whose value differs from `entry`.
fn changed_fields(entry: &AuditEntry, changes: &Map<String, Value>) -> Result<Vec<String>, StoreError> {
    let current =
        serde_json::to_value(entry).map_err(|e| StoreError::Query(e.to_string()))?;
    let mut changed = Vec::new();
    for (field, value) in changes {
        if field == "id" || field == "createdAt" {
            return Err(StoreError::InvalidField(format!(
                "{field} is assigned by the ledger"
            )));
        }
        let Some(existing) = current.get(field) else {
            return Err(StoreError::InvalidField(format!("unknown field {field}")));
        };
        if existing != value {
            changed.push(field.clone());
        }
    }
    Ok(changed)
}
