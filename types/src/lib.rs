//! Core domain types for Vault.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: the assembly
//! engine, the storage backends, and the command-line surface.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod model;
mod schema;
mod scope;
mod state;
mod value;
mod vector;

pub use model::Model;
pub use schema::{Declarator, RESERVED_ID_FIELD, Schema, SchemaError};
pub use scope::{ScopeId, ScopeIdError};
pub use state::{DEFAULT_PRIMARY_KEY, State, StateError};
pub use value::{Primitive, Timestamp, Value, ValueError};
pub use vector::FeatureVector;
