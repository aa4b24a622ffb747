//! Scalar values carried in an action's `extra` map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A scalar extra field value.
///
/// Serialized untagged, so `{"foo": "bar", "n": 3}` round-trips as plain JSON.
/// Variant order matters for deserialization: integers that fit `i64` come
/// back as `Int`, larger ones as `UInt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Must be finite; JSON has no NaN or infinity
    Float(f64),
    Text(String),
}

impl ExtraValue {
    /// Convert a JSON value, returning `None` for arrays, objects and null.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(ExtraValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ExtraValue::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(ExtraValue::UInt(u))
                } else {
                    n.as_f64().map(ExtraValue::Float)
                }
            }
            Value::String(s) => Some(ExtraValue::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ExtraValue::Bool(b) => Value::Bool(*b),
            ExtraValue::Int(i) => Value::from(*i),
            ExtraValue::UInt(u) => Value::from(*u),
            ExtraValue::Float(f) => Value::from(*f),
            ExtraValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// False only for a NaN or infinite `Float`, which JSON would write as `null`.
    pub fn is_finite(&self) -> bool {
        match self {
            ExtraValue::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtraValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraValue::Bool(b) => write!(f, "{}", b),
            ExtraValue::Int(i) => write!(f, "{}", i),
            ExtraValue::UInt(u) => write!(f, "{}", u),
            ExtraValue::Float(v) => write!(f, "{}", v),
            ExtraValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Int(value)
    }
}

impl From<i32> for ExtraValue {
    fn from(value: i32) -> Self {
        ExtraValue::Int(i64::from(value))
    }
}

impl From<u32> for ExtraValue {
    fn from(value: u32) -> Self {
        ExtraValue::Int(i64::from(value))
    }
}

impl From<u64> for ExtraValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => ExtraValue::Int(i),
            Err(_) => ExtraValue::UInt(value),
        }
    }
}

impl From<f64> for ExtraValue {
    fn from(value: f64) -> Self {
        ExtraValue::Float(value)
    }
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Text(value.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::Text(value)
    }
}
