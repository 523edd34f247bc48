//! Read interfaces the assembler consumes.
//!
//! Implementations own all writes; the core only ever calls these methods.
//! Every method must be safe to call concurrently from several assemblies.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;
use vault_types::{Model, Schema, ScopeId, State, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Schema,
    Model,
    States,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Schema => "schema",
            RecordKind::Model => "model",
            RecordKind::States => "state history",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{kind} not found for scope '{scope}'")]
    NotFound { kind: RecordKind, scope: ScopeId },
    /// The backend failed while answering.
    #[error("{kind} lookup for scope '{scope}' failed")]
    Backend {
        kind: RecordKind,
        scope: ScopeId,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    #[must_use]
    pub fn not_found(kind: RecordKind, scope: &ScopeId) -> Self {
        StoreError::NotFound {
            kind,
            scope: scope.clone(),
        }
    }

    pub fn backend(
        kind: RecordKind,
        scope: &ScopeId,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        StoreError::Backend {
            kind,
            scope: scope.clone(),
            source: source.into(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub trait SchemaStore {
    fn schema(&self, scope: &ScopeId) -> Result<Schema, StoreError>;
}

pub trait ModelStore {
    fn model(&self, scope: &ScopeId) -> Result<Model, StoreError>;
}

pub trait StateStore {
    /// Full history of `scope`, ascending by primary key.
    ///
    /// `NotFound` means the scope was never registered; a registered scope
    /// with no observations yields an empty vector.
    fn states(&self, scope: &ScopeId) -> Result<Vec<State>, StoreError>;

    /// The state with the greatest primary key strictly less than `time`.
    fn state_before(&self, scope: &ScopeId, time: Timestamp) -> Result<State, StoreError>;
}

impl<T: SchemaStore + ?Sized> SchemaStore for &T {
    fn schema(&self, scope: &ScopeId) -> Result<Schema, StoreError> {
        (**self).schema(scope)
    }
}

impl<T: ModelStore + ?Sized> ModelStore for &T {
    fn model(&self, scope: &ScopeId) -> Result<Model, StoreError> {
        (**self).model(scope)
    }
}

impl<T: StateStore + ?Sized> StateStore for &T {
    fn states(&self, scope: &ScopeId) -> Result<Vec<State>, StoreError> {
        (**self).states(scope)
    }

    fn state_before(&self, scope: &ScopeId, time: Timestamp) -> Result<State, StoreError> {
        (**self).state_before(scope, time)
    }
}
