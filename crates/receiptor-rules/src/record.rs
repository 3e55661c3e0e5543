//! # Receipt Records
//!
//! A [`Record`] is the subject a rule is evaluated against: a JSON object
//! with top-level fields (`id`, `user_id`, `category`, `tags`, `notes`, ...)
//! and a nested `extracted_data` mapping produced upstream by field
//! extraction (`vendor_name`, `total_amount`, `tax_amount`, `date`,
//! `description`, `line_items`, `payment_method`, `receipt_number`).
//!
//! The engine only reads records; mutations are requested through
//! [`RecordMutator`](crate::store::RecordMutator).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::field;

/// A receipt record, serialized transparently as its JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value. Returns `None` unless the value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Resolve a dotted path. See [`field::resolve`].
    pub fn get(&self, path: &str) -> Option<&Value> {
        field::resolve(path, &self.0)
    }

    /// Write a value at a dotted path. See [`field::assign`].
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        field::assign(path, &mut self.0, value)
    }

    /// The record identifier, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(Value::as_str)
    }

    /// The owning user, if present and non-empty.
    pub fn user_id(&self) -> Option<&str> {
        self.get("user_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The current category, if set.
    pub fn category(&self) -> Option<&str> {
        self.get("category").and_then(Value::as_str)
    }

    /// The current tags. Non-string entries are ignored.
    pub fn tags(&self) -> Vec<String> {
        self.get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A field of the nested `extracted_data` mapping.
    pub fn extracted(&self, key: &str) -> Option<&Value> {
        self.0
            .get("extracted_data")
            .and_then(Value::as_object)
            .and_then(|data| data.get(key))
            .filter(|v| !v.is_null())
    }

    /// Insert a top-level field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record, returning the underlying JSON object.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn from_value_requires_object() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("x")).is_none());
        assert!(Record::from_value(json!({})).is_some());
    }

    #[test]
    fn accessors_read_typed_fields() {
        let r = record(json!({
            "id": "r-1",
            "user_id": "u-1",
            "category": "meals",
            "tags": ["a", 3, "b"],
            "extracted_data": {"vendor_name": "Acme", "date": null}
        }));
        assert_eq!(r.id(), Some("r-1"));
        assert_eq!(r.user_id(), Some("u-1"));
        assert_eq!(r.category(), Some("meals"));
        assert_eq!(r.tags(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(r.extracted("vendor_name"), Some(&json!("Acme")));
        assert!(r.extracted("date").is_none());
    }

    #[test]
    fn empty_user_id_is_absent() {
        let r = record(json!({"user_id": ""}));
        assert!(r.user_id().is_none());
    }

    #[test]
    fn serializes_transparently() {
        let r = record(json!({"id": "r-1", "tags": []}));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, json!({"id": "r-1", "tags": []}));
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
