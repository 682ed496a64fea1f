//! Save-time checks and import conversion for the capture array stored on an
//! owning record.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::clamp_max_captures;

/// Why a capture array was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("capture field \"{field}\": value must be an array")]
    NotAnArray { field: String },

    #[error("capture field \"{field}\": maximum {max} captures allowed, got {len}")]
    TooManyCaptures { field: String, len: usize, max: usize },

    #[error("capture field \"{field}\": capture {index} missing timestamp")]
    MissingTimestamp { field: String, index: usize },
}

/// Validates one capture field's value before the owning record is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidator {
    field: String,
    max: usize,
}

impl FieldValidator {
    /// `max_captures` is clamped into `1..=20`.
    pub fn new(field: impl Into<String>, max_captures: u32) -> Self {
        Self {
            field: field.into(),
            max: clamp_max_captures(max_captures),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Absent and `null` are accepted.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), ValidationError> {
        let items = match value {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ValidationError::NotAnArray {
                    field: self.field.clone(),
                })
            }
        };

        if items.len() > self.max {
            return Err(ValidationError::TooManyCaptures {
                field: self.field.clone(),
                len: items.len(),
                max: self.max,
            });
        }

        for (index, item) in items.iter().enumerate() {
            let Some(meta) = item.get("meta").filter(|m| !m.is_null()) else {
                continue;
            };
            let has_timestamp = match meta.get("timestamp") {
                Some(Value::String(s)) => !s.is_empty(),
                Some(Value::Null) | None => false,
                Some(_) => true,
            };
            if !has_timestamp {
                return Err(ValidationError::MissingTimestamp {
                    field: self.field.clone(),
                    index,
                });
            }
        }

        Ok(())
    }
}

/// Convert an imported value into a capture array.
///
/// `null` becomes `[]`, a bare string becomes a record pointing at that URL with
/// import metadata, and a single non-array value is wrapped into a one-element
/// array.
pub fn import_value(value: Value) -> Value {
    let items = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    };

    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    Value::Array(
        items
            .into_iter()
            .enumerate()
            .map(|(position, item)| match item {
                Value::String(url) => json!({
                    "url": url,
                    "meta": {
                        "timestamp": timestamp,
                        "userId": 0,
                        "userName": "import",
                        "latitude": null,
                        "longitude": null,
                        "accuracy": null,
                        "barcode": null,
                        "deviceInfo": "import",
                        "captureIndex": position + 1,
                        "imageHash": "",
                    }
                }),
                other => other,
            })
            .collect(),
    )
}

/// Comma-joined list of the non-empty URLs in a capture array.
pub fn display_value(value: &Value) -> String {
    let Value::Array(items) = value else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| item.get("url").and_then(Value::as_str))
        .filter(|url| !url.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(timestamp: Option<&str>) -> Value {
        json!({
            "id": 1,
            "url": "/api/attachments/1",
            "meta": { "timestamp": timestamp, "captureIndex": 1, "imageHash": "ab" }
        })
    }

    #[test]
    fn test_null_and_absent_pass() {
        let validator = FieldValidator::new("photos", 5);
        assert_eq!(validator.validate(None), Ok(()));
        assert_eq!(validator.validate(Some(&Value::Null)), Ok(()));
        assert_eq!(validator.validate(Some(&json!([]))), Ok(()));
    }

    #[test]
    fn test_non_array_rejected() {
        let validator = FieldValidator::new("photos", 5);
        let err = validator.validate(Some(&json!({"url": "x"}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotAnArray {
                field: "photos".into()
            }
        );
        assert_eq!(
            err.to_string(),
            "capture field \"photos\": value must be an array"
        );
    }

    #[test]
    fn test_max_boundary() {
        let validator = FieldValidator::new("photos", 3);
        let at_max = Value::Array(vec![capture(Some("2026-02-17T10:00:00Z")); 3]);
        assert_eq!(validator.validate(Some(&at_max)), Ok(()));

        let over = Value::Array(vec![capture(Some("2026-02-17T10:00:00Z")); 4]);
        assert!(matches!(
            validator.validate(Some(&over)),
            Err(ValidationError::TooManyCaptures { len: 4, max: 3, .. })
        ));
    }

    #[test]
    fn test_missing_timestamp_names_index() {
        let validator = FieldValidator::new("photos", 5);
        let value = json!([capture(Some("2026-02-17T10:00:00Z")), capture(None)]);
        let err = validator.validate(Some(&value)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "capture field \"photos\": capture 1 missing timestamp"
        );
    }

    #[test]
    fn test_empty_timestamp_is_missing() {
        let validator = FieldValidator::new("photos", 5);
        let value = json!([capture(Some(""))]);
        assert!(matches!(
            validator.validate(Some(&value)),
            Err(ValidationError::MissingTimestamp { index: 0, .. })
        ));
    }

    #[test]
    fn test_element_without_meta_passes() {
        let validator = FieldValidator::new("photos", 5);
        let value = json!([{ "url": "/a.jpg" }, { "url": "/b.jpg", "meta": null }]);
        assert_eq!(validator.validate(Some(&value)), Ok(()));
    }

    #[test]
    fn test_max_is_clamped() {
        assert_eq!(FieldValidator::new("p", 0).max(), 1);
        assert_eq!(FieldValidator::new("p", 99).max(), 20);
    }

    #[test]
    fn test_import_string_and_null() {
        assert_eq!(import_value(Value::Null), json!([]));

        let imported = import_value(json!(["/a.jpg", "/b.jpg"]));
        assert_eq!(imported[0]["url"], "/a.jpg");
        assert_eq!(imported[1]["meta"]["captureIndex"], 2);
        assert_eq!(imported[1]["meta"]["userName"], "import");
        assert_eq!(imported[1]["meta"]["imageHash"], "");
        assert!(imported[0]["meta"]["timestamp"].as_str().unwrap().ends_with('Z'));

        let wrapped = import_value(json!("/only.jpg"));
        assert_eq!(wrapped.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_imported_value_validates() {
        let validator = FieldValidator::new("photos", 5);
        let imported = import_value(json!(["/a.jpg", "/b.jpg"]));
        assert_eq!(validator.validate(Some(&imported)), Ok(()));
    }

    #[test]
    fn test_display_value() {
        let value = json!([{ "url": "/a.jpg" }, { "url": "" }, { "id": 3 }, { "url": "/b.jpg" }]);
        assert_eq!(display_value(&value), "/a.jpg, /b.jpg");
        assert_eq!(display_value(&Value::Null), "");
    }
}
