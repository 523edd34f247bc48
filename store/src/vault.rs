//! SQLite-backed vault: schemas, models, and state histories in one database.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use vault_core::{ModelStore, RecordKind, SchemaStore, StateStore, StoreError};
use vault_types::{Model, Schema, SchemaError, ScopeId, State, Timestamp, Value};

use crate::sqlite_security::{open_secure_db, secure_sidecars};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    InvalidSchema(#[from] SchemaError),
    #[error("duplicate scope '{0}'")]
    DuplicateScope(ScopeId),
    #[error("scope '{0}' not registered")]
    ScopeNotRegistered(ScopeId),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Persistent store for schemas, models, and state histories.
///
/// A single connection guarded by a mutex; the vault is `Send + Sync` and can
/// serve concurrent assemblies.
pub struct SqliteVault {
    db: Mutex<Connection>,
}

impl SqliteVault {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS schemas (
            scope TEXT PRIMARY KEY,
            fields TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS models (
            scope TEXT PRIMARY KEY,
            factors TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Primary key doubles as the as-of index: (scope, time) descending scans
        CREATE TABLE IF NOT EXISTS states (
            scope TEXT NOT NULL,
            time INTEGER NOT NULL,
            fields TEXT NOT NULL,
            PRIMARY KEY (scope, time)
        );
    ";

    /// Open or create the vault database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = open_secure_db(path)?;
        let vault = Self::initialize(db)?;
        secure_sidecars(path)?;
        tracing::debug!(path = %path.display(), "Opened vault");
        Ok(vault)
    }

    /// Open an in-memory vault (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory vault")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .context("Failed to set vault pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create vault tables")?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Provision tables. Idempotent; `open` already does this.
    pub fn generate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(Self::SCHEMA)
            .context("Failed to create vault tables")?;
        tracing::info!("Vault tables provisioned");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow!("vault connection mutex poisoned"))
    }

    /// Register a scope by declaring its schema. Schemas are immutable: a
    /// second registration for the same scope is rejected.
    pub fn register_schema(
        &self,
        scope: &ScopeId,
        payload: serde_json::Value,
    ) -> Result<Schema, IngestError> {
        let schema = Schema::validate_payload(payload)?;
        let record = serde_json::to_string(&schema.to_json(Some(scope)))
            .context("Failed to serialize schema")?;

        let inserted = self
            .lock()?
            .execute(
                "INSERT OR IGNORE INTO schemas (scope, fields, created_at) VALUES (?1, ?2, ?3)",
                params![scope.as_str(), &record, now_iso8601()],
            )
            .context("Failed to insert schema")?;
        if inserted == 0 {
            return Err(IngestError::DuplicateScope(scope.clone()));
        }

        tracing::info!(%scope, fields = schema.len(), "Registered schema");
        Ok(schema)
    }

    /// Set the factor list of a scope, replacing any previous model.
    pub fn register_model(
        &self,
        scope: &ScopeId,
        factors: Vec<ScopeId>,
    ) -> Result<Model, IngestError> {
        let model = Model::new(scope.clone(), factors);
        let encoded =
            serde_json::to_string(&model.factors).context("Failed to serialize factors")?;

        self.lock()?
            .execute(
                "INSERT INTO models (scope, factors, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope) DO UPDATE SET factors = ?2, updated_at = ?3",
                params![scope.as_str(), &encoded, now_iso8601()],
            )
            .context("Failed to upsert model")?;

        tracing::info!(%scope, factors = model.factors.len(), "Registered model");
        Ok(model)
    }

    /// Store observations for a registered scope. A state whose timestamp is
    /// already present replaces the stored one.
    pub fn insert_states(&self, scope: &ScopeId, states: &[State]) -> Result<usize, IngestError> {
        let mut db = self.lock()?;
        if !scope_registered(&db, scope)? {
            return Err(IngestError::ScopeNotRegistered(scope.clone()));
        }

        let tx = db
            .transaction()
            .context("Failed to start state transaction")?;
        for state in states {
            let fields =
                serde_json::to_string(state.fields()).context("Failed to serialize state")?;
            tx.execute(
                "INSERT OR REPLACE INTO states (scope, time, fields) VALUES (?1, ?2, ?3)",
                params![scope.as_str(), state.time().timestamp_micros(), &fields],
            )
            .context("Failed to insert state")?;
        }
        tx.commit().context("Failed to commit states")?;

        tracing::info!(%scope, count = states.len(), "Stored states");
        Ok(states.len())
    }

    fn load_schema(&self, scope: &ScopeId) -> Result<Option<Schema>> {
        let raw: Option<String> = self
            .lock()?
            .query_row(
                "SELECT fields FROM schemas WHERE scope = ?1",
                [scope.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query schema")?;

        raw.map(|text| {
            let value: serde_json::Value =
                serde_json::from_str(&text).context("Stored schema is not valid JSON")?;
            Schema::from_stored(value).context("Stored schema is not an object")
        })
        .transpose()
    }

    fn load_model(&self, scope: &ScopeId) -> Result<Option<Model>> {
        let raw: Option<String> = self
            .lock()?
            .query_row(
                "SELECT factors FROM models WHERE scope = ?1",
                [scope.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query model")?;

        raw.map(|text| {
            let factors: Vec<ScopeId> =
                serde_json::from_str(&text).context("Stored factor list is invalid")?;
            Ok(Model::new(scope.clone(), factors))
        })
        .transpose()
    }

    fn load_states(&self, scope: &ScopeId) -> Result<Option<Vec<State>>> {
        let db = self.lock()?;
        if !scope_registered(&db, scope)? {
            return Ok(None);
        }

        let mut stmt = db
            .prepare("SELECT time, fields FROM states WHERE scope = ?1 ORDER BY time ASC")
            .context("Failed to prepare state history query")?;
        let rows = stmt
            .query_map([scope.as_str()], |row| {
                let time: i64 = row.get(0)?;
                let fields: String = row.get(1)?;
                Ok((time, fields))
            })
            .context("Failed to query state history")?;

        let mut states = Vec::new();
        for row in rows {
            let (time, fields) = row.context("Failed to read state row")?;
            states.push(decode_state(time, &fields)?);
        }
        Ok(Some(states))
    }

    fn load_state_before(&self, scope: &ScopeId, time: Timestamp) -> Result<Option<State>> {
        let db = self.lock()?;
        if !scope_registered(&db, scope)? {
            return Ok(None);
        }

        let row: Option<(i64, String)> = db
            .query_row(
                "SELECT time, fields FROM states
                 WHERE scope = ?1 AND time < ?2
                 ORDER BY time DESC
                 LIMIT 1",
                params![scope.as_str(), time.timestamp_micros()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to query as-of state")?;

        row.map(|(time, fields)| decode_state(time, &fields))
            .transpose()
    }
}

fn scope_registered(db: &Connection, scope: &ScopeId) -> Result<bool> {
    db.query_row(
        "SELECT EXISTS(SELECT 1 FROM schemas WHERE scope = ?1)",
        [scope.as_str()],
        |row| row.get(0),
    )
    .context("Failed to check scope registration")
}

fn decode_state(micros: i64, fields: &str) -> Result<State> {
    let time = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| anyhow!("Stored timestamp {micros} is out of range"))?;
    let fields: BTreeMap<String, Value> =
        serde_json::from_str(fields).context("Stored state fields are invalid")?;
    Ok(State::from_parts(time, fields))
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SchemaStore for SqliteVault {
    fn schema(&self, scope: &ScopeId) -> Result<Schema, StoreError> {
        tracing::debug!(%scope, "Reading schema");
        match self.load_schema(scope) {
            Ok(Some(schema)) => Ok(schema),
            Ok(None) => Err(StoreError::not_found(RecordKind::Schema, scope)),
            Err(err) => Err(StoreError::backend(RecordKind::Schema, scope, err)),
        }
    }
}

impl ModelStore for SqliteVault {
    fn model(&self, scope: &ScopeId) -> Result<Model, StoreError> {
        tracing::debug!(%scope, "Reading model");
        match self.load_model(scope) {
            Ok(Some(model)) => Ok(model),
            Ok(None) => Err(StoreError::not_found(RecordKind::Model, scope)),
            Err(err) => Err(StoreError::backend(RecordKind::Model, scope, err)),
        }
    }
}

impl StateStore for SqliteVault {
    fn states(&self, scope: &ScopeId) -> Result<Vec<State>, StoreError> {
        tracing::debug!(%scope, "Reading state history");
        match self.load_states(scope) {
            Ok(Some(states)) => Ok(states),
            Ok(None) => Err(StoreError::not_found(RecordKind::States, scope)),
            Err(err) => Err(StoreError::backend(RecordKind::States, scope, err)),
        }
    }

    fn state_before(&self, scope: &ScopeId, time: Timestamp) -> Result<State, StoreError> {
        tracing::debug!(%scope, %time, "Reading as-of state");
        match self.load_state_before(scope, time) {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Err(StoreError::not_found(RecordKind::States, scope)),
            Err(err) => Err(StoreError::backend(RecordKind::States, scope, err)),
        }
    }
}
