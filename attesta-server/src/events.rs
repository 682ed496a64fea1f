//! Persistence events
//!
//! Stores emit an event before every write they perform and after every
//! create. Subscribers registered for a `(collection, kind)` pair run in
//! registration order; the first error aborts the emit, and for `Before*`
//! events the store then refuses the write.

use std::sync::Arc;

use async_trait::async_trait;
use attesta_core::{CurrentUser, ValidationError, COMPLIANCE_VIOLATION_PREFIX};
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

/// Which point of a write an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeSave,
    AfterCreate,
    BeforeUpdate,
    BeforeDestroy,
}

#[derive(Debug, Clone)]
pub enum PersistenceEvent {
    /// A record of `collection` is about to be written.
    BeforeSave { collection: String, record: Value },
    /// A record has been created. `actor` is the caller that created it.
    AfterCreate {
        collection: String,
        record: Value,
        actor: Option<CurrentUser>,
    },
    /// An existing record is about to change. `changed` lists the camelCase
    /// names of fields whose value differs.
    BeforeUpdate {
        collection: String,
        id: i64,
        changed: Vec<String>,
    },
    BeforeDestroy { collection: String, id: i64 },
}

impl PersistenceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BeforeSave { .. } => EventKind::BeforeSave,
            Self::AfterCreate { .. } => EventKind::AfterCreate,
            Self::BeforeUpdate { .. } => EventKind::BeforeUpdate,
            Self::BeforeDestroy { .. } => EventKind::BeforeDestroy,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::BeforeSave { collection, .. }
            | Self::AfterCreate { collection, .. }
            | Self::BeforeUpdate { collection, .. }
            | Self::BeforeDestroy { collection, .. } => collection,
        }
    }
}

/// Why a subscriber refused an event.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HookError {
    #[error("{prefix}: {0}", prefix = COMPLIANCE_VIOLATION_PREFIX)]
    ComplianceViolation(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{subscriber} failed: {message}")]
    Internal { subscriber: String, message: String },
}

/// Reacts to persistence events.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &PersistenceEvent) -> Result<(), HookError>;
}

/// Ordered dispatch of persistence events to subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<(String, EventKind), Vec<Arc<dyn Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        collection: impl Into<String>,
        kind: EventKind,
        subscriber: Arc<dyn Subscriber>,
    ) {
        let collection = collection.into();
        tracing::debug!(
            collection = %collection,
            ?kind,
            subscriber = subscriber.name(),
            "Subscriber registered"
        );
        self.subscribers
            .entry((collection, kind))
            .or_default()
            .push(subscriber);
    }

    /// Run every subscriber for the event, stopping at the first error.
    pub async fn emit(&self, event: &PersistenceEvent) -> Result<(), HookError> {
        // Clone out of the map so no shard lock is held across an await.
        let subscribers = self
            .subscribers
            .get(&(event.collection().to_string(), event.kind()))
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        for subscriber in subscribers {
            if let Err(e) = subscriber.handle(event).await {
                tracing::warn!(
                    collection = event.collection(),
                    kind = ?event.kind(),
                    subscriber = subscriber.name(),
                    error = %e,
                    "Persistence event rejected"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn subscriber_count(&self, collection: &str, kind: EventKind) -> usize {
        self.subscribers
            .get(&(collection.to_string(), kind))
            .map_or(0, |entry| entry.len())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("registrations", &self.subscribers.len())
            .finish()
    }
}
