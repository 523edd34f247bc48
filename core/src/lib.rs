//! Feature-vector assembly for Vault.
//!
//! Joins every state of a primary scope against the most recent prior state
//! of each factor scope its model names, encodes the factor fields according
//! to their schemas, and flattens the result into one numeric row per state.
//!
//! # Architecture
//!
//! ```text
//! Assembler::assemble(scope)
//! ├── ModelStore::model          (factor list, fatal if absent)
//! ├── StateStore::states         (primary history, fatal if absent)
//! └── per state, per factor
//!     ├── SchemaStore::schema    (skipped if absent)
//!     ├── TemporalJoin::as_of    (fatal if absent)
//!     └── encode_field           (one sub-vector per declared field)
//! ```
//!
//! The core only reads from its stores and never logs above `debug`.

mod assemble;
mod cancel;
mod encode;
mod join;
mod memory;
mod store;

pub use assemble::{AssembleError, AssembleOptions, Assembler, FieldKeyMode};
pub use cancel::CancelFlag;
pub use encode::{EncodeError, Encoded, encode, encode_field};
pub use join::{JoinError, TemporalJoin, latest_before};
pub use memory::MemoryStore;
pub use store::{ModelStore, RecordKind, SchemaStore, StateStore, StoreError};
