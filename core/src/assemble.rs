//! Feature-matrix assembly.
//!
//! Failure handling is two-tier. A factor whose schema cannot be read is
//! skipped (`FactorOutcome::Skipped`) and the row simply lacks its
//! columns; every other failure (model, primary history, a factor's as-of
//! value, a type mismatch) aborts the whole call with an [`AssembleError`]
//! and no rows.

use std::collections::BTreeMap;

use thiserror::Error;
use vault_types::{FeatureVector, Model, Schema, ScopeId, State, Timestamp};

use crate::cancel::CancelFlag;
use crate::encode::{EncodeError, Encoded, encode_field};
use crate::join::{JoinError, TemporalJoin};
use crate::store::{ModelStore, SchemaStore, StateStore, StoreError};

/// How encoded fields are keyed when merging factors into a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKeyMode {
    /// Key by field name alone. Factors sharing a field name collide and the
    /// factor listed later in the model wins.
    #[default]
    Shared,
    /// Key by `(factor scope, field name)`; nothing collides.
    Namespaced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    pub key_mode: FieldKeyMode,
}

/// Column key of one encoded segment. Orders by factor (namespaced mode
/// only), then by field name bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct FieldKey {
    factor: Option<ScopeId>,
    field: String,
}

impl FieldKey {
    fn new(mode: FieldKeyMode, factor: &ScopeId, field: &str) -> Self {
        let factor = match mode {
            FieldKeyMode::Shared => None,
            FieldKeyMode::Namespaced => Some(factor.clone()),
        };
        Self {
            factor,
            field: field.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("model not found for scope '{scope}'")]
    ModelNotFound { scope: ScopeId },
    #[error("scope '{scope}' is not registered")]
    ScopeNotFound { scope: ScopeId },
    #[error("factor '{factor}' of '{scope}' could not be resolved as of {at}")]
    FactorLookupFailed {
        scope: ScopeId,
        factor: ScopeId,
        at: Timestamp,
        #[source]
        source: JoinError,
    },
    #[error("field '{field}' of factor '{factor}' does not fit its declarator")]
    TypeMismatch {
        factor: ScopeId,
        field: String,
        #[source]
        source: EncodeError,
    },
    #[error("storage failure while assembling '{scope}'")]
    Store {
        scope: ScopeId,
        #[source]
        source: StoreError,
    },
    #[error("assembly of '{scope}' was cancelled")]
    Cancelled { scope: ScopeId },
}

/// Per-factor result inside one row.
enum FactorOutcome {
    Contributed(Vec<(FieldKey, Vec<f64>)>),
    Skipped(StoreError),
}

/// Entry point of the core: builds the feature matrix for a scope.
pub struct Assembler<'a> {
    schemas: &'a dyn SchemaStore,
    models: &'a dyn ModelStore,
    states: &'a dyn StateStore,
    options: AssembleOptions,
    cancel: Option<CancelFlag>,
}

impl<'a> Assembler<'a> {
    /// Assembler over a single store that serves schemas, models, and states.
    #[must_use]
    pub fn new<S>(store: &'a S) -> Self
    where
        S: SchemaStore + ModelStore + StateStore,
    {
        Self::from_parts(store, store, store)
    }

    #[must_use]
    pub fn from_parts(
        schemas: &'a dyn SchemaStore,
        models: &'a dyn ModelStore,
        states: &'a dyn StateStore,
    ) -> Self {
        Self {
            schemas,
            models,
            states,
            options: AssembleOptions::default(),
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: AssembleOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// One row per state of `scope`, in ascending primary-key order.
    pub fn assemble(&self, scope: &ScopeId) -> Result<Vec<FeatureVector>, AssembleError> {
        let model = self.models.model(scope).map_err(|err| match err {
            StoreError::NotFound { .. } => AssembleError::ModelNotFound {
                scope: scope.clone(),
            },
            source => AssembleError::Store {
                scope: scope.clone(),
                source,
            },
        })?;

        let primary = self.states.states(scope).map_err(|err| match err {
            StoreError::NotFound { .. } => AssembleError::ScopeNotFound {
                scope: scope.clone(),
            },
            source => AssembleError::Store {
                scope: scope.clone(),
                source,
            },
        })?;

        let join = TemporalJoin::new(self.states);
        primary
            .iter()
            .map(|state| self.assemble_row(scope, &model, &join, state))
            .collect()
    }

    fn assemble_row(
        &self,
        scope: &ScopeId,
        model: &Model,
        join: &TemporalJoin<'_>,
        state: &State,
    ) -> Result<FeatureVector, AssembleError> {
        let mut segments: BTreeMap<FieldKey, Vec<f64>> = BTreeMap::new();

        for factor in &model.factors {
            self.check_cancelled(scope)?;
            match self.factor_outcome(scope, factor, join, state.time())? {
                FactorOutcome::Contributed(encoded) => segments.extend(encoded),
                FactorOutcome::Skipped(reason) => {
                    tracing::debug!(%scope, %factor, error = %reason, "factor skipped");
                }
            }
        }

        self.check_cancelled(scope)?;
        Ok(FeatureVector::new(
            segments.into_values().flatten().collect(),
        ))
    }

    fn factor_outcome(
        &self,
        scope: &ScopeId,
        factor: &ScopeId,
        join: &TemporalJoin<'_>,
        at: Timestamp,
    ) -> Result<FactorOutcome, AssembleError> {
        let schema = match self.schemas.schema(factor) {
            Ok(schema) => schema,
            Err(reason) => return Ok(FactorOutcome::Skipped(reason)),
        };

        let observed = join
            .as_of(factor, at)
            .map_err(|source| AssembleError::FactorLookupFailed {
                scope: scope.clone(),
                factor: factor.clone(),
                at,
                source,
            })?;

        self.encode_factor(factor, &schema, &observed)
            .map(FactorOutcome::Contributed)
    }

    fn encode_factor(
        &self,
        factor: &ScopeId,
        schema: &Schema,
        observed: &State,
    ) -> Result<Vec<(FieldKey, Vec<f64>)>, AssembleError> {
        let mut encoded = Vec::with_capacity(schema.len());
        for (field, declarator) in schema.data_fields() {
            let result = encode_field(field, observed.get(field), declarator).map_err(|source| {
                AssembleError::TypeMismatch {
                    factor: factor.clone(),
                    field: field.to_string(),
                    source,
                }
            })?;
            if let Encoded::Vector(vector) = result {
                encoded.push((FieldKey::new(self.options.key_mode, factor, field), vector));
            }
        }
        Ok(encoded)
    }

    fn check_cancelled(&self, scope: &ScopeId) -> Result<(), AssembleError> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(AssembleError::Cancelled {
                scope: scope.clone(),
            }),
            _ => Ok(()),
        }
    }
}
