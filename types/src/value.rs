//! Field values carried by a [`State`](crate::State).
//!
//! Values form a closed set so consumers can match exhaustively instead of
//! probing a dynamic JSON tree at runtime.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Primary-key timestamp type for every stored observation.
pub type Timestamp = DateTime<Utc>;

/// Scalar admissible inside lists and enumerated domains.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum Primitive {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// A single field value of an observation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    List(Vec<Primitive>),
    /// Only built in code through `From<Timestamp>`. JSON input never yields
    /// it: RFC 3339 strings in data fields stay `Text`.
    Timestamp(Timestamp),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("null is not a storable value")]
    Null,
    #[error("nested objects are not supported")]
    Object,
    #[error("lists may only contain numbers, strings, or booleans")]
    NestedList,
    #[error("number {0} is not representable as a 64-bit float")]
    Number(String),
}

impl Primitive {
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Primitive::Number(n) => number_to_json(*n),
            Primitive::Text(text) => serde_json::Value::String(text.clone()),
            Primitive::Bool(flag) => serde_json::Value::Bool(*flag),
        }
    }
}

impl Value {
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) | Value::Bool(_) | Value::List(_) | Value::Timestamp(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            Value::Number(_) | Value::Text(_) | Value::List(_) | Value::Timestamp(_) => None,
        }
    }

    /// Short type name used in mismatch diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Timestamp(_) => "timestamp",
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Number(n) => number_to_json(*n),
            Value::Text(text) => serde_json::Value::String(text.clone()),
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Primitive::to_json).collect())
            }
            Value::Timestamp(time) => serde_json::Value::String(format_timestamp(*time)),
        }
    }
}

/// RFC 3339 rendering shared by state output and storage.
#[must_use]
pub(crate) fn format_timestamp(time: Timestamp) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn number_to_json(n: f64) -> serde_json::Value {
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn json_number(n: &serde_json::Number) -> Result<f64, ValueError> {
    n.as_f64().ok_or_else(|| ValueError::Number(n.to_string()))
}

impl TryFrom<serde_json::Value> for Primitive {
    type Error = ValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(n) => Ok(Primitive::Number(json_number(&n)?)),
            serde_json::Value::String(text) => Ok(Primitive::Text(text)),
            serde_json::Value::Bool(flag) => Ok(Primitive::Bool(flag)),
            serde_json::Value::Array(_) => Err(ValueError::NestedList),
            serde_json::Value::Object(_) => Err(ValueError::Object),
            serde_json::Value::Null => Err(ValueError::Null),
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(n) => Ok(Value::Number(json_number(&n)?)),
            serde_json::Value::String(text) => Ok(Value::Text(text)),
            serde_json::Value::Bool(flag) => Ok(Value::Bool(flag)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Primitive::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            serde_json::Value::Object(_) => Err(ValueError::Object),
            serde_json::Value::Null => Err(ValueError::Null),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::Text(value.to_string())
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

impl From<f64> for Primitive {
    fn from(value: f64) -> Self {
        Primitive::Number(value)
    }
}

impl Serialize for Primitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
