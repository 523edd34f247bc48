//! Per-scope dependency model.

use serde::{Deserialize, Serialize};

use crate::ScopeId;

/// The factor scopes a scope is predicted from.
///
/// Factor order decides which factor wins when two of them declare the same
/// field name; it does not affect column order. A scope may list itself and
/// models may form cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "id")]
    pub scope: ScopeId,
    pub factors: Vec<ScopeId>,
}

impl Model {
    #[must_use]
    pub fn new(scope: ScopeId, factors: Vec<ScopeId>) -> Self {
        Self { scope, factors }
    }
}
