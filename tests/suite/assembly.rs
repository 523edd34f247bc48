//! Assembly over the SQLite vault.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use vault_core::{
    AssembleError, AssembleOptions, Assembler, CancelFlag, FieldKeyMode, MemoryStore,
};
use vault_store::SqliteVault;
use vault_types::{Model, Schema, State};

use crate::common::{at, sales_weather_vault, scope};

#[test]
fn sales_weather_end_to_end() {
    let vault = sales_weather_vault();
    let rows = Assembler::new(&vault)
        .assemble(&scope("sales"))
        .expect("assemble");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].as_slice(), &[0.0, 1.0]);
}

#[test]
fn unregistered_scope_has_no_model() {
    let vault = sales_weather_vault();
    let err = Assembler::new(&vault)
        .assemble(&scope("unregistered-scope"))
        .unwrap_err();
    assert!(matches!(err, AssembleError::ModelNotFound { .. }));
}

#[test]
fn model_without_registered_primary_is_scope_not_found() {
    let vault = SqliteVault::open_in_memory().expect("open vault");
    vault
        .register_model(&scope("orphan"), vec![scope("weather")])
        .expect("model");
    let err = Assembler::new(&vault).assemble(&scope("orphan")).unwrap_err();
    assert!(matches!(err, AssembleError::ScopeNotFound { .. }));
}

#[test]
fn primary_state_before_any_factor_state_aborts() {
    let vault = sales_weather_vault();
    vault
        .insert_states(&scope("sales"), &[State::new(at(1))])
        .expect("early sale");
    let err = Assembler::new(&vault)
        .assemble(&scope("sales"))
        .unwrap_err();
    assert!(matches!(err, AssembleError::FactorLookupFailed { .. }));
}

#[test]
fn equal_timestamps_are_not_joined() {
    let vault = sales_weather_vault();
    vault
        .insert_states(
            &scope("weather"),
            &[State::new(at(10)).with_field("condition", "sunny")],
        )
        .expect("weather at 10");
    let rows = Assembler::new(&vault)
        .assemble(&scope("sales"))
        .expect("assemble");
    // The sunny state shares the sale's timestamp; the rainy one at t=5 wins.
    assert_eq!(rows[0].as_slice(), &[0.0, 1.0]);
}

#[test]
fn shared_and_namespaced_keys() {
    let vault = SqliteVault::open_in_memory().expect("open vault");
    for name in ["a", "b"] {
        vault
            .register_schema(&scope(name), json!({"x": "number"}))
            .expect("schema");
        vault
            .insert_states(&scope(name), &[State::new(at(1)).with_field("x", 1.0)])
            .expect("state");
    }
    vault
        .insert_states(&scope("b"), &[State::new(at(2)).with_field("x", 2.0)])
        .expect("state");
    vault.register_schema(&scope("p"), json!({})).expect("schema");
    vault
        .register_model(&scope("p"), vec![scope("a"), scope("b")])
        .expect("model");
    vault
        .insert_states(&scope("p"), &[State::new(at(3))])
        .expect("primary");

    let shared = Assembler::new(&vault).assemble(&scope("p")).expect("shared");
    assert_eq!(shared[0].as_slice(), &[2.0]);

    let namespaced = Assembler::new(&vault)
        .with_options(AssembleOptions {
            key_mode: FieldKeyMode::Namespaced,
        })
        .assemble(&scope("p"))
        .expect("namespaced");
    assert_eq!(namespaced[0].as_slice(), &[1.0, 2.0]);
}

#[test]
fn sqlite_and_memory_stores_agree() {
    let vault = sales_weather_vault();
    vault
        .insert_states(
            &scope("weather"),
            &[State::new(at(15)).with_field("condition", "sunny")],
        )
        .expect("weather");
    vault
        .insert_states(&scope("sales"), &[State::new(at(20)), State::new(at(12))])
        .expect("sales");

    let mut memory = MemoryStore::new();
    memory.register(
        scope("weather"),
        Schema::validate_payload(json!({"condition": ["sunny", "rainy"]})).expect("schema"),
    );
    memory.register(scope("sales"), Schema::new());
    memory.set_model(Model::new(scope("sales"), vec![scope("weather")]));
    memory.insert_states(
        &scope("weather"),
        [
            State::new(at(5)).with_field("condition", "rainy"),
            State::new(at(15)).with_field("condition", "sunny"),
        ],
    );
    memory.insert_states(
        &scope("sales"),
        [State::new(at(10)), State::new(at(12)), State::new(at(20))],
    );

    let from_sqlite = Assembler::new(&vault).assemble(&scope("sales")).expect("sqlite");
    let from_memory = Assembler::new(&memory).assemble(&scope("sales")).expect("memory");
    assert_eq!(from_sqlite, from_memory);
    assert_eq!(
        from_sqlite
            .iter()
            .map(|row| row.as_slice().to_vec())
            .collect::<Vec<_>>(),
        vec![vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0, 0.0]]
    );
}

#[test]
fn concurrent_assemblies_share_one_vault() {
    let vault = Arc::new(sales_weather_vault());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let vault = Arc::clone(&vault);
            thread::spawn(move || Assembler::new(vault.as_ref()).assemble(&scope("sales")))
        })
        .collect();

    for handle in handles {
        let rows = handle.join().expect("thread").expect("assemble");
        assert_eq!(rows[0].as_slice(), &[0.0, 1.0]);
    }
}

#[test]
fn raised_flag_cancels_before_any_row() {
    let vault = sales_weather_vault();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = Assembler::new(&vault)
        .with_cancel(cancel)
        .assemble(&scope("sales"))
        .unwrap_err();
    assert!(matches!(err, AssembleError::Cancelled { .. }));
}
