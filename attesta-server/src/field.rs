//! The `capture` field type: a JSON array of capture records on an owning
//! record, validated on every save.

use std::sync::Arc;

use async_trait::async_trait;
use attesta_core::validation::{display_value, import_value};
use attesta_core::{CaptureFieldConfig, FieldValidator};
use serde_json::Value;

use crate::events::{EventBus, EventKind, HookError, PersistenceEvent, Subscriber};
use crate::host::FieldType;

pub const CAPTURE_FIELD_TYPE: &str = "capture";

pub struct CaptureFieldType {
    default_max: u32,
}

impl CaptureFieldType {
    /// `default_max` applies to fields whose options omit `maxCaptures`.
    pub fn new(default_max: u32) -> Self {
        Self { default_max }
    }

    fn validator(&self, field: &str, options: &Value) -> FieldValidator {
        let max = match options.get("maxCaptures") {
            Some(_) => serde_json::from_value::<CaptureFieldConfig>(options.clone())
                .map(|c| c.max_captures)
                .unwrap_or(self.default_max),
            None => self.default_max,
        };
        FieldValidator::new(field, max)
    }
}

impl FieldType for CaptureFieldType {
    fn name(&self) -> &'static str {
        CAPTURE_FIELD_TYPE
    }

    fn bind(&self, collection: &str, field: &str, options: &Value, events: &EventBus) {
        let validator = self.validator(field, options);
        tracing::debug!(collection, field, max = validator.max(), "Binding capture validator");
        events.subscribe(
            collection,
            EventKind::BeforeSave,
            Arc::new(CaptureFieldGuard { validator }),
        );
    }

    fn import_value(&self, value: Value) -> Value {
        import_value(value)
    }

    fn display_value(&self, value: &Value) -> String {
        display_value(value)
    }
}

/// Runs a [`FieldValidator`] against the owning record before it is written.
struct CaptureFieldGuard {
    validator: FieldValidator,
}

#[async_trait]
impl Subscriber for CaptureFieldGuard {
    fn name(&self) -> &str {
        "capture-field-validator"
    }

    async fn handle(&self, event: &PersistenceEvent) -> Result<(), HookError> {
        let PersistenceEvent::BeforeSave { record, .. } = event else {
            return Ok(());
        };
        self.validator
            .validate(record.get(self.validator.field()))
            .map_err(HookError::from)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::host::{HostError, PluginContext, RecordStore};

    fn captures(n: usize) -> Value {
        Value::Array(
            (1..=n)
                .map(|i| {
                    json!({
                        "url": format!("/api/attachments/{i}"),
                        "meta": {"timestamp": "2026-02-17T10:00:00Z", "captureIndex": i}
                    })
                })
                .collect(),
        )
    }

    async fn store_with_field(options: Value) -> RecordStore {
        let events = Arc::new(EventBus::new());
        let ctx = PluginContext::new(events.clone());
        ctx.field_types.register(Arc::new(CaptureFieldType::new(5)));
        ctx.define_field("inspections", "photos", CAPTURE_FIELD_TYPE, &options)
            .unwrap();
        RecordStore::new(events)
    }

    #[tokio::test]
    async fn test_max_boundary_on_save() {
        let store = store_with_field(json!({"maxCaptures": 3})).await;

        assert!(store
            .create("inspections", json!({"photos": captures(3)}), None)
            .await
            .is_ok());

        let err = store
            .create("inspections", json!({"photos": captures(4)}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Rejected(HookError::Validation(_))));
        assert_eq!(
            err.to_string(),
            "capture field \"photos\": maximum 3 captures allowed, got 4"
        );
    }

    #[tokio::test]
    async fn test_default_max_applies_without_option() {
        let store = store_with_field(json!({"cameraOnly": false})).await;
        assert!(store
            .create("inspections", json!({"photos": captures(5)}), None)
            .await
            .is_ok());
        assert!(store
            .create("inspections", json!({"photos": captures(6)}), None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_timestamp_rejected_on_update() {
        let store = store_with_field(json!({})).await;
        store
            .create("inspections", json!({"photos": null}), None)
            .await
            .unwrap();

        let changes = json!({"photos": [{"url": "/a", "meta": {"captureIndex": 1}}]})
            .as_object()
            .cloned()
            .unwrap();
        let err = store.save("inspections", 1, changes).await.unwrap_err();
        assert!(err.to_string().contains("capture 0 missing timestamp"));
    }

    #[test]
    fn test_import_and_display() {
        let field = CaptureFieldType::new(5);
        let imported = field.import_value(json!("https://files/a.jpg"));
        assert_eq!(imported[0]["meta"]["userName"], "import");
        assert_eq!(field.display_value(&imported), "https://files/a.jpg");
    }
}
