//! Subcommand definitions and handlers.
//!
//! Every handler writes a single JSON document to stdout; diagnostics go
//! through `tracing` to stderr.

use std::io::{self, Read, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use vault_config::Settings;
use vault_core::{
    AssembleOptions, Assembler, CancelFlag, FieldKeyMode, ModelStore, SchemaStore, StateStore,
};
use vault_store::SqliteVault;
use vault_types::{FeatureVector, ScopeId, State};

#[derive(Subcommand)]
pub enum Command {
    /// Create the vault tables (safe to repeat)
    Generate,

    /// Register or inspect a scope's schema
    #[command(subcommand)]
    Schema(SchemaCommand),

    /// Set or inspect a scope's factor list
    #[command(subcommand)]
    Model(ModelCommand),

    /// Add or list observations of a scope
    #[command(subcommand)]
    State(StateCommand),

    /// Assemble the feature matrix of a scope
    ///
    /// Prints one numeric row per state, in ascending time order.
    Data(DataArgs),
}

#[derive(Subcommand)]
pub enum SchemaCommand {
    /// Register a scope with a JSON object of field declarators
    ///
    /// Declarators are "number", "bool", or an array of allowed values.
    /// Pass `-` to read the JSON from stdin.
    Set { scope: String, json: String },
    /// Print the registered schema
    Get { scope: String },
}

#[derive(Subcommand)]
pub enum ModelCommand {
    /// Replace the factor list of a scope
    Set {
        scope: String,
        #[arg(num_args = 0..)]
        factors: Vec<String>,
    },
    /// Print the model
    Get { scope: String },
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// Store one JSON object or an array of objects
    ///
    /// The primary-key field must be an RFC 3339 timestamp; states without
    /// one are stamped with the current time. Pass `-` to read stdin.
    Add { scope: String, json: String },
    /// Print every stored state in time order
    List { scope: String },
}

#[derive(Args)]
pub struct DataArgs {
    pub scope: String,

    /// Key encoded fields by (factor, field) so same-named fields never collide
    #[arg(long, overrides_with = "no_namespace_fields")]
    pub namespace_fields: bool,

    /// Key encoded fields by name alone, even if config or env enables namespacing
    #[arg(long, overrides_with = "namespace_fields")]
    pub no_namespace_fields: bool,
}

impl DataArgs {
    /// Flags win over the configured default; the last flag given wins.
    fn key_mode(&self, configured: bool) -> FieldKeyMode {
        let namespaced = if self.namespace_fields {
            true
        } else if self.no_namespace_fields {
            false
        } else {
            configured
        };
        if namespaced {
            FieldKeyMode::Namespaced
        } else {
            FieldKeyMode::Shared
        }
    }
}

pub async fn run(command: Command, settings: &Settings) -> Result<()> {
    let vault = Arc::new(SqliteVault::open(&settings.database)?);

    match command {
        Command::Generate => {
            vault.generate()?;
            print_json(&serde_json::json!({
                "database": settings.database.display().to_string(),
            }))
        }
        Command::Schema(SchemaCommand::Set { scope, json }) => {
            let scope = parse_scope(&scope)?;
            let payload = read_json_arg(&json)?;
            let schema = vault.register_schema(&scope, payload)?;
            print_json(&schema.to_json(Some(&scope)))
        }
        Command::Schema(SchemaCommand::Get { scope }) => {
            let scope = parse_scope(&scope)?;
            let schema = vault.schema(&scope)?;
            print_json(&schema.to_json(Some(&scope)))
        }
        Command::Model(ModelCommand::Set { scope, factors }) => {
            let scope = parse_scope(&scope)?;
            let factors = factors
                .iter()
                .map(|factor| parse_scope(factor))
                .collect::<Result<Vec<_>>>()?;
            let model = vault.register_model(&scope, factors)?;
            print_json(&serde_json::to_value(&model)?)
        }
        Command::Model(ModelCommand::Get { scope }) => {
            let model = vault.model(&parse_scope(&scope)?)?;
            print_json(&serde_json::to_value(&model)?)
        }
        Command::State(StateCommand::Add { scope, json }) => {
            let scope = parse_scope(&scope)?;
            let raw = read_json_arg(&json)?;
            let states = State::normalize_batch(raw, &settings.primary_key)
                .context("Invalid state payload")?;
            let inserted = vault.insert_states(&scope, &states)?;
            print_json(&serde_json::json!({ "inserted": inserted }))
        }
        Command::State(StateCommand::List { scope }) => {
            let states = vault.states(&parse_scope(&scope)?)?;
            let rendered: Vec<_> = states
                .iter()
                .map(|state| state.to_json(&settings.primary_key))
                .collect();
            print_json(&serde_json::Value::Array(rendered))
        }
        Command::Data(args) => {
            let scope = parse_scope(&args.scope)?;
            let key_mode = args.key_mode(settings.namespace_fields);
            let rows = assemble(vault, scope, AssembleOptions { key_mode }).await?;
            print_json(&serde_json::to_value(&rows)?)
        }
    }
}

/// Run assembly on a blocking thread; Ctrl-C raises the cancellation flag.
async fn assemble(
    vault: Arc<SqliteVault>,
    scope: ScopeId,
    options: AssembleOptions,
) -> Result<Vec<FeatureVector>> {
    let cancel = CancelFlag::new();

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling assembly");
                cancel.cancel();
            }
        })
    };

    let task = tokio::task::spawn_blocking(move || {
        Assembler::new(vault.as_ref())
            .with_options(options)
            .with_cancel(cancel)
            .assemble(&scope)
    });
    let result = task.await.context("Assembly task failed");
    interrupt.abort();

    let rows = result??;
    tracing::debug!(rows = rows.len(), "Assembly finished");
    Ok(rows)
}

fn parse_scope(raw: &str) -> Result<ScopeId> {
    ScopeId::new(raw).with_context(|| format!("Invalid scope {raw:?}"))
}

fn read_json_arg(arg: &str) -> Result<serde_json::Value> {
    if arg == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read JSON from stdin")?;
        return serde_json::from_str(&buf).context("Invalid JSON on stdin");
    }
    serde_json::from_str(arg).context("Invalid JSON argument")
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).context("Failed to write output")?;
    writeln!(out).context("Failed to write output")?;
    Ok(())
}
