//! Shared test utilities and fixtures
//!
//! Builders for populated vaults and a handle on the compiled `vault` binary.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use chrono::DateTime;
use serde_json::json;
use vault_store::SqliteVault;
use vault_types::{ScopeId, State, Timestamp};

pub fn at(secs: i64) -> Timestamp {
    DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}

pub fn scope(name: &str) -> ScopeId {
    ScopeId::new(name).expect("valid scope")
}

/// `sales` driven by `weather`: one rainy weather state at t=5 and one sales
/// state at t=10.
pub fn sales_weather_vault() -> SqliteVault {
    let vault = SqliteVault::open_in_memory().expect("open vault");
    vault
        .register_schema(&scope("weather"), json!({"condition": ["sunny", "rainy"]}))
        .expect("register weather");
    vault
        .register_schema(&scope("sales"), json!({"units": "number"}))
        .expect("register sales");
    vault
        .register_model(&scope("sales"), vec![scope("weather")])
        .expect("register model");
    vault
        .insert_states(
            &scope("weather"),
            &[State::new(at(5)).with_field("condition", "rainy")],
        )
        .expect("insert weather");
    vault
        .insert_states(&scope("sales"), &[State::new(at(10)).with_field("units", 3.0)])
        .expect("insert sales");
    vault
}

/// The `vault` binary isolated from the caller's home directory and
/// `VAULT_*` environment, pointed at `database`.
pub fn vault_cmd(home: &Path, database: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vault"));
    cmd.env("HOME", home)
        .env_remove("VAULT_DATABASE")
        .env_remove("VAULT_PRIMARY_KEY")
        .env_remove("VAULT_NAMESPACE_FIELDS")
        .env_remove("RUST_LOG")
        .arg("--database")
        .arg(database);
    cmd
}

pub fn run_ok(mut cmd: Command) -> serde_json::Value {
    let output = cmd.output().expect("spawn vault");
    assert!(
        output.status.success(),
        "vault failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

pub fn run_err(mut cmd: Command) -> Output {
    let output = cmd.output().expect("spawn vault");
    assert_eq!(output.status.code(), Some(1), "expected exit code 1");
    output
}
