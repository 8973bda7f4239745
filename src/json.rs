//! Portable JSON values for the transport boundary.
//!
//! [`PortableJson`] is a thin, typed-accessor wrapper over
//! `serde_json::Value`; [`PortableJsonParser`] is the parse/stringify seam
//! the device client decodes through.

use serde_json::value::Index;
use serde_json::{Map, Value};

/// JSON failure.
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("index {index} is too far past the end of an array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("expected {expected}, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
}

/// Most null slots `put_at` will insert to reach an index.
pub const MAX_ARRAY_PADDING: usize = 4096;

/// A JSON value: object, array or scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct PortableJson(Value);

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl PortableJson {
    pub fn object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn array() -> Self {
        Self(Value::Array(Vec::new()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Object keys; empty for anything that is not an object.
    pub fn keys(&self) -> Vec<&str> {
        match &self.0 {
            Value::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Array length or object entry count; zero for scalars.
    pub fn len(&self) -> usize {
        match &self.0 {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set `key` on an object.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<PortableJson>) -> Result<(), JsonError> {
        match &mut self.0 {
            Value::Object(map) => {
                map.insert(key.into(), value.into().0);
                Ok(())
            }
            other => Err(JsonError::WrongKind {
                expected: "object",
                found: kind(other),
            }),
        }
    }

    /// Set `index` on an array. Indices past the end pad with null, up to
    /// [`MAX_ARRAY_PADDING`] slots.
    pub fn put_at(&mut self, index: usize, value: impl Into<PortableJson>) -> Result<(), JsonError> {
        match &mut self.0 {
            Value::Array(items) => {
                let len = items.len();
                if index >= len {
                    if index - len > MAX_ARRAY_PADDING {
                        return Err(JsonError::IndexOutOfRange { index, len });
                    }
                    items.resize(index + 1, Value::Null);
                }
                items[index] = value.into().0;
                Ok(())
            }
            other => Err(JsonError::WrongKind {
                expected: "array",
                found: kind(other),
            }),
        }
    }

    pub fn get_string<I: Index>(&self, index: I) -> Option<&str> {
        self.0.get(index)?.as_str()
    }

    pub fn get_int<I: Index>(&self, index: I) -> Option<i64> {
        self.0.get(index)?.as_i64()
    }

    pub fn get_number<I: Index>(&self, index: I) -> Option<f64> {
        self.0.get(index)?.as_f64()
    }

    pub fn get_bool<I: Index>(&self, index: I) -> Option<bool> {
        self.0.get(index)?.as_bool()
    }

    /// Nested object or array, cloned.
    pub fn get_object<I: Index>(&self, index: I) -> Option<PortableJson> {
        match self.0.get(index)? {
            v @ (Value::Object(_) | Value::Array(_)) => Some(Self(v.clone())),
            _ => None,
        }
    }
}

impl From<Value> for PortableJson {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for PortableJson {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for PortableJson {
    fn from(value: String) -> Self {
        Self(Value::from(value))
    }
}

impl From<i32> for PortableJson {
    fn from(value: i32) -> Self {
        Self(Value::from(value))
    }
}

impl From<i64> for PortableJson {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<f64> for PortableJson {
    fn from(value: f64) -> Self {
        Self(Value::from(value))
    }
}

impl From<bool> for PortableJson {
    fn from(value: bool) -> Self {
        Self(Value::from(value))
    }
}

/// Parse/stringify seam for transport payloads.
pub trait PortableJsonParser: Send + Sync {
    fn parse(&self, json: &str) -> Result<PortableJson, JsonError>;

    fn stringify(&self, json: &PortableJson) -> String;

    fn empty_object(&self) -> PortableJson {
        PortableJson::object()
    }

    fn empty_array(&self) -> PortableJson {
        PortableJson::array()
    }
}

/// `serde_json` backed parser. Object keys stringify in sorted order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonParser;

impl PortableJsonParser for SerdeJsonParser {
    fn parse(&self, json: &str) -> Result<PortableJson, JsonError> {
        Ok(PortableJson(serde_json::from_str(json)?))
    }

    fn stringify(&self, json: &PortableJson) -> String {
        json.0.to_string()
    }
}
