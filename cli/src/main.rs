//! Vault CLI - binary entry point.
//!
//! Resolves settings (config file, then `VAULT_*` environment, then flags),
//! opens the SQLite vault, and dispatches one subcommand. Results are JSON on
//! stdout; logs go to stderr so output stays pipeable.
//!
//! ```text
//! main() -> Cli::parse() -> Settings::resolve() -> commands::run()
//!                                                      |
//!                              data: spawn_blocking(Assembler::assemble)
//!                                    + ctrl_c -> CancelFlag::cancel
//! ```

mod commands;

use std::{io, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use vault_config::{Settings, VaultConfig};

use crate::commands::Command;

#[derive(Parser)]
#[command(name = "vault", version, about = "Scoped time-series vault and feature-vector assembly")]
struct Cli {
    /// SQLite database file (overrides VAULT_DATABASE and the config file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Name of the timestamp field in submitted and printed states
    #[arg(long, global = true)]
    primary_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn load_settings(cli: &Cli) -> Settings {
    // A broken config file is reported by `load` and otherwise ignored.
    let config = VaultConfig::load().ok().flatten();
    let mut settings = Settings::resolve(config.as_ref());

    if let Some(database) = &cli.database {
        settings.database.clone_from(database);
    }
    if let Some(primary_key) = cli.primary_key.as_ref().filter(|key| !key.trim().is_empty()) {
        settings.primary_key.clone_from(primary_key);
    }
    settings
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let settings = load_settings(&cli);
    tracing::debug!(
        database = %settings.database.display(),
        primary_key = %settings.primary_key,
        "Resolved settings"
    );

    commands::run(cli.command, &settings).await
}
