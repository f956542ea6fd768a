//! Tagged-union representation of the model's structured block.
//!
//! Fields in the JSON block range over null, scalars, lists and nested
//! objects. Converting once into [`FieldValue`] lets the formatting and
//! reconciliation code match exhaustively on shape. Object key order is
//! preserved as emitted by the model.

use serde_json::Value;

/// Literal written to the report when a field has no data.
pub const NONE_PLACEHOLDER: &str = "None";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    List(Vec<FieldValue>),
    Object(Vec<(String, FieldValue)>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Null, blank text, the `None` placeholder, or an empty collection.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => {
                let t = s.trim();
                t.is_empty() || t == NONE_PLACEHOLDER
            }
            Self::List(items) => items.is_empty(),
            Self::Object(fields) => fields.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Null | Self::Text(_))
    }

    /// Field lookup on objects: exact key first, then case-insensitive.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        match self {
            Self::Object(fields) => lookup(fields, key),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(FieldValue::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

fn lookup<'a>(fields: &'a [(String, FieldValue)], key: &str) -> Option<&'a FieldValue> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .or_else(|| fields.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
        .map(|(_, v)| v)
}

/// Top-level structured block of one analysis. Empty when extraction failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredData {
    fields: Vec<(String, FieldValue)>,
}

impl StructuredData {
    /// Only JSON objects become structured data; anything else is empty.
    pub fn from_json(value: Value) -> Self {
        match FieldValue::from(value) {
            FieldValue::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        lookup(&self.fields, key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_pretty_json(&self) -> String {
        let value = FieldValue::Object(self.fields.clone()).to_json();
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}
