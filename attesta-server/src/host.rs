//! Minimal plugin host: field-type registry, plugin context and a record
//! store for the collections that own capture fields.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use attesta_core::CurrentUser;
use dashmap::DashMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::events::{EventBus, HookError, PersistenceEvent};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("Record must be a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Rejected(#[from] HookError),
}

/// A field type a plugin contributes to the host.
pub trait FieldType: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attach the type's save-time behaviour to one field instance.
    fn bind(&self, collection: &str, field: &str, options: &Value, events: &EventBus);

    /// Convert an imported value into the stored representation.
    fn import_value(&self, value: Value) -> Value;

    /// Plain-text rendering of a stored value.
    fn display_value(&self, value: &Value) -> String;
}

#[derive(Default)]
pub struct FieldTypeRegistry {
    types: DashMap<&'static str, Arc<dyn FieldType>>,
}

impl FieldTypeRegistry {
    pub fn register(&self, field_type: Arc<dyn FieldType>) {
        tracing::debug!(field_type = field_type.name(), "Field type registered");
        self.types.insert(field_type.name(), field_type);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FieldType>> {
        self.types.get(name).map(|t| t.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

/// What a plugin sees of the host during its lifecycle.
#[derive(Clone)]
pub struct PluginContext {
    pub events: Arc<EventBus>,
    pub field_types: Arc<FieldTypeRegistry>,
}

impl PluginContext {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            events,
            field_types: Arc::new(FieldTypeRegistry::default()),
        }
    }

    /// Declare `collection.field` with a registered field type.
    pub fn define_field(
        &self,
        collection: &str,
        field: &str,
        type_name: &str,
        options: &Value,
    ) -> Result<(), HostError> {
        let field_type = self
            .field_types
            .get(type_name)
            .ok_or_else(|| HostError::UnknownFieldType(type_name.to_string()))?;
        field_type.bind(collection, field, options, &self.events);
        tracing::info!(collection, field, field_type = type_name, "Field defined");
        Ok(())
    }
}

/// In-memory store for owning records. Every save emits `BeforeSave` and
/// every create emits `AfterCreate`.
pub struct RecordStore {
    records: DashMap<(String, i64), Value>,
    next_id: AtomicI64,
    events: Arc<EventBus>,
}

impl RecordStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI64::new(1),
            events,
        }
    }

    /// Create a record. Returns the stored record with its `id`.
    pub async fn create(
        &self,
        collection: &str,
        values: Value,
        actor: Option<CurrentUser>,
    ) -> Result<Value, HostError> {
        let Value::Object(mut values) = values else {
            return Err(HostError::NotAnObject);
        };
        values.remove("id");

        self.events
            .emit(&PersistenceEvent::BeforeSave {
                collection: collection.to_string(),
                record: Value::Object(values.clone()),
            })
            .await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        values.insert("id".into(), Value::from(id));
        let record = Value::Object(values);
        self.records
            .insert((collection.to_string(), id), record.clone());

        self.events
            .emit(&PersistenceEvent::AfterCreate {
                collection: collection.to_string(),
                record: record.clone(),
                actor,
            })
            .await?;
        Ok(record)
    }

    /// Merge `changes` into an existing record and save it.
    pub async fn save(
        &self,
        collection: &str,
        id: i64,
        changes: Map<String, Value>,
    ) -> Result<Option<Value>, HostError> {
        let Some(current) = self.get(collection, id) else {
            return Ok(None);
        };
        let Value::Object(mut merged) = current else {
            return Err(HostError::NotAnObject);
        };
        for (key, value) in changes {
            if key != "id" {
                merged.insert(key, value);
            }
        }

        self.events
            .emit(&PersistenceEvent::BeforeSave {
                collection: collection.to_string(),
                record: Value::Object(merged.clone()),
            })
            .await?;

        let record = Value::Object(merged);
        self.records
            .insert((collection.to_string(), id), record.clone());
        Ok(Some(record))
    }

    pub fn get(&self, collection: &str, id: i64) -> Option<Value> {
        self.records
            .get(&(collection.to_string(), id))
            .map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::events::{EventKind, Subscriber};

    struct RejectAll;

    #[async_trait]
    impl Subscriber for RejectAll {
        fn name(&self) -> &str {
            "reject-all"
        }

        async fn handle(&self, _event: &PersistenceEvent) -> Result<(), HookError> {
            Err(HookError::Internal {
                subscriber: "reject-all".into(),
                message: "refused".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_get_returns_it() {
        let store = RecordStore::new(Arc::new(EventBus::new()));
        let record = store
            .create("inspections", json!({"id": 500, "lot": "A1"}), None)
            .await
            .unwrap();
        assert_eq!(record["id"], 1);
        assert_eq!(store.get("inspections", 1).unwrap()["lot"], "A1");
        assert!(store.get("other", 1).is_none());
    }

    #[tokio::test]
    async fn test_rejected_save_is_not_written() {
        let events = Arc::new(EventBus::new());
        let store = RecordStore::new(events.clone());
        store
            .create("inspections", json!({"lot": "A1"}), None)
            .await
            .unwrap();

        events.subscribe("inspections", EventKind::BeforeSave, Arc::new(RejectAll));
        let changes = json!({"lot": "B2"}).as_object().cloned().unwrap();
        assert!(store.save("inspections", 1, changes).await.is_err());
        assert_eq!(store.get("inspections", 1).unwrap()["lot"], "A1");

        assert!(matches!(
            store.create("inspections", json!([1, 2]), None).await,
            Err(HostError::NotAnObject)
        ));
    }

    #[test]
    fn test_unknown_field_type() {
        let ctx = PluginContext::new(Arc::new(EventBus::new()));
        let err = ctx
            .define_field("inspections", "photos", "capture", &json!({}))
            .unwrap_err();
        assert!(matches!(err, HostError::UnknownFieldType(name) if name == "capture"));
    }
}
