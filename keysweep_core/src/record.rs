//! Record and query types shared across the scan and repair phases
//!
//! A [`Record`] is an order-preserving map of field name to JSON value.
//! Field declaration order is identity-bearing: duplicate signatures are the
//! ordered concatenation of field/value pairs, so the map must hand fields
//! back in the order the store declared them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered field map backing a [`Record`]
pub type Fields = IndexMap<String, Value>;

/// A single record fetched from, or destined for, the remote store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: Fields,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field value, appending it if the field is new
    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    /// Remove a field, preserving the order of the remaining fields
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// The record's identifier under `id_field`, if present and a string
    pub fn id(&self, id_field: &str) -> Option<&str> {
        self.fields.get(id_field).and_then(Value::as_str)
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record carries no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Render a field value the way it appears in signatures and audit lines.
///
/// Strings render bare (no quotes), everything else in its JSON form.
/// A string value of "null" therefore renders the same as a null field;
/// matching-key fields are not expected to hold that literal.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A read query against one object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Object type the query targets
    pub object_type: String,
    /// Fields selected, in selection order
    pub fields: Vec<String>,
    /// Full query text handed to the store's read primitive
    pub text: String,
}

impl Query {
    /// Build a query selecting `fields` from `object_type`
    pub fn select(object_type: &str, fields: Vec<String>) -> Self {
        let text = format!("SELECT {} FROM {}", fields.join(","), object_type);
        Self {
            object_type: object_type.to_string(),
            fields,
            text,
        }
    }
}
