//! Typed values destined for the search index.

use chrono::NaiveDateTime;

/// A single typed field value.
///
/// The index schema decides the kind; records arrive as strings and are
/// converted at the document-builder boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Double(f64),
    Date(NaiveDateTime),
    Bool(bool),
}

impl FieldValue {
    /// Wire representation used by the remote backend and CSV emission.
    ///
    /// Dates render as ISO-8601 with a `Z` suffix, matching the index
    /// backend's date syntax.
    pub fn to_wire_string(&self) -> String {
        match self {
            FieldValue::Str(s) => s.clone(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Double(d) => d.to_string(),
            FieldValue::Date(d) => d.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }

    /// JSON representation for the remote update protocol.
    pub fn as_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Str(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Double(d) => serde_json::Value::from(*d),
            FieldValue::Date(_) => serde_json::Value::String(self.to_wire_string()),
            FieldValue::Bool(b) => serde_json::Value::from(*b),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(v: NaiveDateTime) -> Self {
        FieldValue::Date(v)
    }
}
