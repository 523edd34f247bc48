//! Per-scope field declarations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::ScopeId;
use crate::value::Primitive;

/// Field name reserved for the scope identifier in stored schema records.
pub const RESERVED_ID_FIELD: &str = "id";

/// Declared type of one schema field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum Declarator {
    /// `"number"`: numeric passthrough.
    Number,
    /// `"bool"`: accepted at registration, contributes no columns.
    Bool,
    /// Ordered list of admissible categorical values.
    Domain(Vec<Primitive>),
    /// Anything else found in a stored schema. Kept so reads never fail,
    /// rejected at registration.
    Unrecognized(serde_json::Value),
}

impl Declarator {
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(name) if name == "number" => Declarator::Number,
            serde_json::Value::String(name) if name == "bool" => Declarator::Bool,
            serde_json::Value::Array(items) => items
                .iter()
                .cloned()
                .map(Primitive::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_or_else(|_| Declarator::Unrecognized(value.clone()), Declarator::Domain),
            other => Declarator::Unrecognized(other.clone()),
        }
    }

    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Declarator::Unrecognized(_))
    }

    /// True only for a domain spelled exactly `[false, true]`.
    #[must_use]
    pub fn is_boolean_domain(&self) -> bool {
        match self {
            Declarator::Domain(values) => {
                matches!(
                    values.as_slice(),
                    [Primitive::Bool(false), Primitive::Bool(true)]
                )
            }
            Declarator::Number | Declarator::Bool | Declarator::Unrecognized(_) => false,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Declarator::Number => serde_json::Value::String("number".to_string()),
            Declarator::Bool => serde_json::Value::String("bool".to_string()),
            Declarator::Domain(values) => {
                serde_json::Value::Array(values.iter().map(Primitive::to_json).collect())
            }
            Declarator::Unrecognized(raw) => raw.clone(),
        }
    }
}

impl From<serde_json::Value> for Declarator {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(&value)
    }
}

impl Serialize for Declarator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Mapping from field name to declarator for one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: BTreeMap<String, Declarator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema must be a JSON object")]
    NotAnObject,
    #[error("invalid field: 'id'")]
    ReservedField,
    #[error("invalid fields: {}", .0.join(", "))]
    InvalidFields(Vec<String>),
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, declarator: Declarator) -> Self {
        self.fields.insert(name.into(), declarator);
        self
    }

    /// Read a schema record as stored, tolerating unknown declarators and the
    /// `id` entry the store adds.
    pub fn from_stored(raw: serde_json::Value) -> Result<Self, SchemaError> {
        let serde_json::Value::Object(object) = raw else {
            return Err(SchemaError::NotAnObject);
        };
        let fields = object
            .into_iter()
            .map(|(name, value)| {
                let declarator = Declarator::from_json(&value);
                (name, declarator)
            })
            .collect();
        Ok(Self { fields })
    }

    /// Validate a submitted schema payload.
    ///
    /// Rejects the reserved `id` field outright and reports every field whose
    /// declarator is not `number`, `bool`, or a list of primitives.
    pub fn validate_payload(raw: serde_json::Value) -> Result<Self, SchemaError> {
        let schema = Self::from_stored(raw)?;
        if schema.fields.contains_key(RESERVED_ID_FIELD) {
            return Err(SchemaError::ReservedField);
        }
        let invalid: Vec<String> = schema
            .fields
            .iter()
            .filter(|(_, declarator)| !declarator.is_recognized())
            .map(|(name, _)| name.clone())
            .collect();
        if invalid.is_empty() {
            Ok(schema)
        } else {
            Err(SchemaError::InvalidFields(invalid))
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Declarator> {
        self.fields.get(field)
    }

    /// Declared data fields in name order, never including `id`.
    pub fn data_fields(&self) -> impl Iterator<Item = (&str, &Declarator)> {
        self.fields
            .iter()
            .filter(|(name, _)| name.as_str() != RESERVED_ID_FIELD)
            .map(|(name, declarator)| (name.as_str(), declarator))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data_fields().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the data fields, tagging the record with `id` when a scope is given.
    #[must_use]
    pub fn to_json(&self, scope: Option<&ScopeId>) -> serde_json::Value {
        let mut object: serde_json::Map<String, serde_json::Value> = self
            .data_fields()
            .map(|(name, declarator)| (name.to_string(), declarator.to_json()))
            .collect();
        if let Some(scope) = scope {
            object.insert(
                RESERVED_ID_FIELD.to_string(),
                serde_json::Value::String(scope.to_string()),
            );
        }
        serde_json::Value::Object(object)
    }
}
