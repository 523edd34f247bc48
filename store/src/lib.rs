//! SQLite persistence for Vault.
//!
//! [`SqliteVault`] is the write side (schema registration, model
//! registration, state ingestion) and implements the read interfaces that
//! [`vault_core::Assembler`] consumes.
//!
//! # Tables
//!
//! ```text
//! schemas(scope PK, fields JSON, created_at)   registration = state table exists
//! models(scope PK, factors JSON, updated_at)   insert or replace
//! states(scope, time µs, fields JSON)          PK (scope, time), replace on conflict
//! ```

mod sqlite_security;
mod vault;

pub use vault::{IngestError, SqliteVault};
