//! In-process store backed by sorted vectors.

use std::collections::HashMap;

use vault_types::{Model, Schema, ScopeId, State, Timestamp};

use crate::join::latest_before;
use crate::store::{ModelStore, RecordKind, SchemaStore, StateStore, StoreError};

/// Store implementation that keeps everything in memory.
///
/// Writes take `&mut self`; once built, any number of assemblies may read it
/// through shared references. A scope's history exists once it is declared,
/// either explicitly or by inserting states.
#[derive(Debug, Default)]
pub struct MemoryStore {
    schemas: HashMap<ScopeId, Schema>,
    models: HashMap<ScopeId, Model>,
    histories: HashMap<ScopeId, Vec<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope with its schema, creating an empty history.
    pub fn register(&mut self, scope: ScopeId, schema: Schema) {
        self.histories.entry(scope.clone()).or_default();
        self.schemas.insert(scope, schema);
    }

    /// Create an empty history without a schema.
    pub fn declare(&mut self, scope: ScopeId) {
        self.histories.entry(scope).or_default();
    }

    pub fn set_model(&mut self, model: Model) {
        self.models.insert(model.scope.clone(), model);
    }

    /// Insert states, replacing any existing state with the same timestamp.
    pub fn insert_states(&mut self, scope: &ScopeId, states: impl IntoIterator<Item = State>) {
        let history = self.histories.entry(scope.clone()).or_default();
        for state in states {
            match history.binary_search_by_key(&state.time(), State::time) {
                Ok(index) => history[index] = state,
                Err(index) => history.insert(index, state),
            }
        }
    }
}

impl SchemaStore for MemoryStore {
    fn schema(&self, scope: &ScopeId) -> Result<Schema, StoreError> {
        self.schemas
            .get(scope)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::Schema, scope))
    }
}

impl ModelStore for MemoryStore {
    fn model(&self, scope: &ScopeId) -> Result<Model, StoreError> {
        self.models
            .get(scope)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::Model, scope))
    }
}

impl StateStore for MemoryStore {
    fn states(&self, scope: &ScopeId) -> Result<Vec<State>, StoreError> {
        self.histories
            .get(scope)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::States, scope))
    }

    fn state_before(&self, scope: &ScopeId, time: Timestamp) -> Result<State, StoreError> {
        let history = self
            .histories
            .get(scope)
            .ok_or_else(|| StoreError::not_found(RecordKind::States, scope))?;
        latest_before(history, time)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::States, scope))
    }
}
