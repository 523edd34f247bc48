//! The `vault` binary driven end to end against a temporary database.

use serde_json::json;
use tempfile::TempDir;

use crate::common::{run_err, run_ok, vault_cmd};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn cmd(&self, args: &[&str]) -> std::process::Command {
        let mut cmd = vault_cmd(self.dir.path(), &self.dir.path().join("vault.db"));
        cmd.args(args);
        cmd
    }
}

#[test]
fn generate_creates_database() {
    let ws = Workspace::new();
    let out = run_ok(ws.cmd(&["generate"]));
    assert!(out["database"].as_str().unwrap().ends_with("vault.db"));
    assert!(ws.dir.path().join("vault.db").exists());
}

#[test]
fn schema_set_then_get() {
    let ws = Workspace::new();
    run_ok(ws.cmd(&["schema", "set", "weather", r#"{"condition":["sunny","rainy"]}"#]));
    let schema = run_ok(ws.cmd(&["schema", "get", "weather"]));
    assert_eq!(
        schema,
        json!({"id": "weather", "condition": ["sunny", "rainy"]})
    );
}

#[test]
fn duplicate_schema_exits_with_error() {
    let ws = Workspace::new();
    run_ok(ws.cmd(&["schema", "set", "weather", r#"{"t":"number"}"#]));
    let output = run_err(ws.cmd(&["schema", "set", "weather", r#"{"t":"number"}"#]));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("duplicate scope 'weather'"), "{stderr}");
}

#[test]
fn model_set_then_get() {
    let ws = Workspace::new();
    run_ok(ws.cmd(&["model", "set", "sales", "weather", "holidays"]));
    let model = run_ok(ws.cmd(&["model", "get", "sales"]));
    assert_eq!(model, json!({"id": "sales", "factors": ["weather", "holidays"]}));
}

#[test]
fn state_add_and_list_with_custom_key() {
    let ws = Workspace::new();
    run_ok(ws.cmd(&["schema", "set", "weather", r#"{"t":"number"}"#]));
    let added = run_ok(ws.cmd(&[
        "--primary-key",
        "at",
        "state",
        "add",
        "weather",
        r#"[{"at":"2024-01-01T00:00:02Z","t":2},{"at":"2024-01-01T00:00:01Z","t":1}]"#,
    ]));
    assert_eq!(added, json!({"inserted": 2}));

    let listed = run_ok(ws.cmd(&["--primary-key", "at", "state", "list", "weather"]));
    assert_eq!(
        listed,
        json!([
            {"at": "2024-01-01T00:00:01Z", "t": 1.0},
            {"at": "2024-01-01T00:00:02Z", "t": 2.0},
        ])
    );
}

#[test]
fn data_prints_feature_matrix() {
    let ws = Workspace::new();
    run_ok(ws.cmd(&["schema", "set", "weather", r#"{"condition":["sunny","rainy"]}"#]));
    run_ok(ws.cmd(&["schema", "set", "sales", "{}"]));
    run_ok(ws.cmd(&["model", "set", "sales", "weather"]));
    run_ok(ws.cmd(&[
        "state",
        "add",
        "weather",
        r#"{"time":"1970-01-01T00:00:05Z","condition":"rainy"}"#,
    ]));
    run_ok(ws.cmd(&["state", "add", "sales", r#"{"time":"1970-01-01T00:00:10Z"}"#]));

    let rows = run_ok(ws.cmd(&["data", "sales"]));
    assert_eq!(rows, json!([[0.0, 1.0]]));
}

#[test]
fn data_for_unknown_scope_fails() {
    let ws = Workspace::new();
    let output = run_err(ws.cmd(&["data", "nowhere"]));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("model not found"), "{stderr}");
}

#[test]
fn invalid_json_argument_fails() {
    let ws = Workspace::new();
    run_err(ws.cmd(&["schema", "set", "weather", "{not json"]));
}

#[test]
fn no_namespace_flag_overrides_environment() {
    let ws = Workspace::new();
    for factor in ["a", "b"] {
        run_ok(ws.cmd(&["schema", "set", factor, r#"{"x":"number"}"#]));
    }
    run_ok(ws.cmd(&["schema", "set", "p", "{}"]));
    run_ok(ws.cmd(&["model", "set", "p", "a", "b"]));
    run_ok(ws.cmd(&["state", "add", "a", r#"{"time":"1970-01-01T00:00:01Z","x":1}"#]));
    run_ok(ws.cmd(&["state", "add", "b", r#"{"time":"1970-01-01T00:00:01Z","x":2}"#]));
    run_ok(ws.cmd(&["state", "add", "p", r#"{"time":"1970-01-01T00:00:03Z"}"#]));

    let mut namespaced = ws.cmd(&["data", "p"]);
    namespaced.env("VAULT_NAMESPACE_FIELDS", "true");
    assert_eq!(run_ok(namespaced), json!([[1.0, 2.0]]));

    let mut shared = ws.cmd(&["data", "p", "--no-namespace-fields"]);
    shared.env("VAULT_NAMESPACE_FIELDS", "true");
    assert_eq!(run_ok(shared), json!([[2.0]]));
}
