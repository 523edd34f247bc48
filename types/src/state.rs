//! Time-stamped observations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::value::{Timestamp, Value, ValueError, format_timestamp};

/// Field name that carries the primary temporal key unless configured otherwise.
pub const DEFAULT_PRIMARY_KEY: &str = "time";

/// One observation within a scope.
///
/// The primary temporal key is held apart from the data fields, so every
/// `State` has a timestamp by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    time: Timestamp,
    fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("state must be a JSON object")]
    NotAnObject,
    #[error("state batch must be a JSON object or an array of objects")]
    NotABatch,
    #[error("invalid value for field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: ValueError,
    },
}

impl State {
    #[must_use]
    pub fn new(time: Timestamp) -> Self {
        Self {
            time,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn from_parts(time: Timestamp, fields: BTreeMap<String, Value>) -> Self {
        Self { time, fields }
    }

    #[must_use]
    pub const fn time(&self) -> Timestamp {
        self.time
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Normalize a submitted JSON object into a `State`, stamping it with the
    /// current time when the primary key is missing or unparsable.
    pub fn normalize(raw: serde_json::Value, primary_key: &str) -> Result<Self, StateError> {
        Self::normalize_at(raw, primary_key, Utc::now())
    }

    /// Like [`State::normalize`] with an explicit fallback time.
    ///
    /// The primary key is honored only when it is an RFC 3339 string; any
    /// other shape falls back to `now`. `null` fields are dropped.
    pub fn normalize_at(
        raw: serde_json::Value,
        primary_key: &str,
        now: Timestamp,
    ) -> Result<Self, StateError> {
        let serde_json::Value::Object(object) = raw else {
            return Err(StateError::NotAnObject);
        };

        let mut time = now;
        let mut fields = BTreeMap::new();
        for (name, value) in object {
            if name == primary_key {
                if let Some(parsed) = value
                    .as_str()
                    .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
                {
                    time = parsed.with_timezone(&Utc);
                }
                continue;
            }
            if value.is_null() {
                continue;
            }
            let value = Value::try_from(value).map_err(|source| StateError::Field {
                field: name.clone(),
                source,
            })?;
            fields.insert(name, value);
        }

        Ok(Self { time, fields })
    }

    /// Normalize either a single object or an array of objects.
    ///
    /// Each element without a usable key gets its own wall-clock stamp.
    pub fn normalize_batch(
        raw: serde_json::Value,
        primary_key: &str,
    ) -> Result<Vec<Self>, StateError> {
        match raw {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| Self::normalize(item, primary_key))
                .collect(),
            object @ serde_json::Value::Object(_) => Ok(vec![Self::normalize(object, primary_key)?]),
            _ => Err(StateError::NotABatch),
        }
    }

    /// Render as a JSON object with the primary key as an RFC 3339 string.
    #[must_use]
    pub fn to_json(&self, primary_key: &str) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        object.insert(
            primary_key.to_string(),
            serde_json::Value::String(format_timestamp(self.time)),
        );
        serde_json::Value::Object(object)
    }
}
