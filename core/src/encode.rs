//! Schema-directed encoding of single field values.

use thiserror::Error;
use vault_types::{Declarator, Primitive, RESERVED_ID_FIELD, Value};

/// Result of encoding one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// Fixed-length sub-vector for the field.
    Vector(Vec<f64>),
    /// The field contributes nothing to the row.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Encode a named field, skipping the reserved `id` entry whatever it declares.
pub fn encode_field(
    name: &str,
    value: Option<&Value>,
    declarator: &Declarator,
) -> Result<Encoded, EncodeError> {
    if name == RESERVED_ID_FIELD {
        return Ok(Encoded::Skip);
    }
    encode(value, declarator)
}

/// Encode `value` according to `declarator`.
///
/// - `number`: `[value]`; anything but a number is a [`EncodeError::TypeMismatch`].
/// - boolean domain `[false, true]`: `[is_false, is_true]`, all zero when not a boolean.
/// - enumerated domain: one-hot at the first equal member, all zero otherwise.
/// - `bool` and unrecognized: [`Encoded::Skip`].
pub fn encode(value: Option<&Value>, declarator: &Declarator) -> Result<Encoded, EncodeError> {
    match declarator {
        Declarator::Number => match value {
            Some(Value::Number(n)) => Ok(Encoded::Vector(vec![*n])),
            other => Err(EncodeError::TypeMismatch {
                expected: "number",
                found: other.map_or("nothing", Value::kind),
            }),
        },
        Declarator::Domain(_) if declarator.is_boolean_domain() => {
            Ok(Encoded::Vector(boolean_one_hot(value)))
        }
        Declarator::Domain(members) => Ok(Encoded::Vector(one_hot(value, members))),
        Declarator::Bool | Declarator::Unrecognized(_) => Ok(Encoded::Skip),
    }
}

fn boolean_one_hot(value: Option<&Value>) -> Vec<f64> {
    let mut vector = vec![0.0; 2];
    if let Some(flag) = value.and_then(Value::as_bool) {
        vector[usize::from(flag)] = 1.0;
    }
    vector
}

fn one_hot(value: Option<&Value>, members: &[Primitive]) -> Vec<f64> {
    let mut vector = vec![0.0; members.len()];
    if let Some(value) = value
        && let Some(index) = members.iter().position(|member| member_matches(member, value))
    {
        vector[index] = 1.0;
    }
    vector
}

// Only string members ever match; numeric or boolean members in a general
// domain stay zero rather than being coerced.
fn member_matches(member: &Primitive, value: &Value) -> bool {
    match (member, value) {
        (Primitive::Text(expected), Value::Text(actual)) => expected == actual,
        _ => false,
    }
}
