//! Ingestion paths: JSON payloads through normalization into the vault.

use chrono::{DateTime, Utc};
use serde_json::json;
use vault_core::StateStore;
use vault_store::{IngestError, SqliteVault};
use vault_types::{SchemaError, State, Value};

use crate::common::{at, scope};

fn registered(name: &str) -> SqliteVault {
    let vault = SqliteVault::open_in_memory().expect("open vault");
    vault
        .register_schema(&scope(name), json!({"t": "number", "tags": ["a", "b"]}))
        .expect("schema");
    vault
}

#[test]
fn batch_payload_lands_in_time_order() {
    let vault = registered("weather");
    let payload = json!([
        {"time": "2024-01-01T00:00:20Z", "t": 2.0},
        {"time": "2024-01-01T00:00:10Z", "t": 1.0, "tags": ["a", "b"]},
    ]);
    let states = State::normalize_batch(payload, "time").expect("normalize");
    assert_eq!(vault.insert_states(&scope("weather"), &states).unwrap(), 2);

    let stored = vault.states(&scope("weather")).unwrap();
    let base: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
    assert_eq!(stored[0].time(), base + chrono::Duration::seconds(10));
    assert_eq!(stored[1].time(), base + chrono::Duration::seconds(20));
    assert_eq!(
        stored[0].get("tags"),
        Some(&Value::List(vec!["a".into(), "b".into()]))
    );
}

#[test]
fn custom_primary_key_round_trips() {
    let vault = registered("weather");
    let states = State::normalize_batch(
        json!({"stamp": "2024-05-01T12:00:00Z", "t": 7.5, "time": "not the key"}),
        "stamp",
    )
    .expect("normalize");
    vault.insert_states(&scope("weather"), &states).unwrap();

    let rendered = vault.states(&scope("weather")).unwrap()[0].to_json("stamp");
    assert_eq!(rendered["stamp"], json!("2024-05-01T12:00:00Z"));
    assert_eq!(rendered["t"], json!(7.5));
    assert_eq!(rendered["time"], json!("not the key"));
}

#[test]
fn resubmitting_a_timestamp_replaces_the_state() {
    let vault = registered("weather");
    vault
        .insert_states(&scope("weather"), &[State::new(at(1)).with_field("t", 1.0)])
        .unwrap();
    vault
        .insert_states(&scope("weather"), &[State::new(at(1)).with_field("t", 9.0)])
        .unwrap();
    let stored = vault.states(&scope("weather")).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("t"), Some(&Value::Number(9.0)));
}

#[test]
fn schema_payload_lists_every_invalid_field() {
    let vault = SqliteVault::open_in_memory().expect("open vault");
    let err = vault
        .register_schema(
            &scope("weather"),
            json!({"a": "number", "b": "text", "c": {"nested": true}}),
        )
        .unwrap_err();
    match err {
        IngestError::InvalidSchema(SchemaError::InvalidFields(fields)) => {
            assert_eq!(fields, vec!["b".to_string(), "c".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn states_for_unknown_scope_are_rejected() {
    let vault = SqliteVault::open_in_memory().expect("open vault");
    let err = vault
        .insert_states(&scope("ghost"), &[State::new(at(1))])
        .unwrap_err();
    assert!(matches!(err, IngestError::ScopeNotRegistered(_)));
}
