//! Vault configuration.
//!
//! Settings come from three layers, later ones winning:
//! `~/.vault/config.toml`, `VAULT_*` environment variables, then command-line
//! flags (applied by the binary on top of [`Settings`]).

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use vault_types::DEFAULT_PRIMARY_KEY;

pub const ENV_DATABASE: &str = "VAULT_DATABASE";
pub const ENV_PRIMARY_KEY: &str = "VAULT_PRIMARY_KEY";
pub const ENV_NAMESPACE_FIELDS: &str = "VAULT_NAMESPACE_FIELDS";

#[derive(Debug, Default, Deserialize)]
pub struct VaultConfig {
    pub storage: Option<StorageConfig>,
    pub data: Option<DataConfig>,
    pub assemble: Option<AssembleConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Database file. `${VAR}` references are expanded.
    pub database: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataConfig {
    /// Name of the timestamp field in submitted and rendered states.
    pub primary_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssembleConfig {
    #[serde(default)]
    pub namespace_fields: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Expand `${VAR}` references. Unset variables expand to the empty string;
/// an unterminated `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl VaultConfig {
    /// Load `~/.vault/config.toml`. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn database(&self) -> Option<PathBuf> {
        self.storage
            .as_ref()
            .and_then(|storage| storage.database.as_deref())
            .map(expand_env_vars)
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from)
    }

    fn primary_key(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|data| data.primary_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    fn namespace_fields(&self) -> Option<bool> {
        self.assemble.as_ref().map(|assemble| assemble.namespace_fields)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vault").join("config.toml"))
}

#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from("vault.db"),
        |home| home.join(".vault").join("vault.db"),
    )
}

/// Effective settings after config file and environment are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub primary_key: String,
    pub namespace_fields: bool,
}

impl Settings {
    /// Merge `config` with the process environment.
    #[must_use]
    pub fn resolve(config: Option<&VaultConfig>) -> Self {
        Self::resolve_with(config, |name| env::var(name).ok())
    }

    /// Merge `config` with variables supplied by `lookup`.
    pub fn resolve_with(
        config: Option<&VaultConfig>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let database = lookup(ENV_DATABASE)
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| config.and_then(VaultConfig::database))
            .unwrap_or_else(default_database_path);

        let primary_key = lookup(ENV_PRIMARY_KEY)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| config.and_then(VaultConfig::primary_key))
            .unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string());

        let namespace_fields = lookup(ENV_NAMESPACE_FIELDS)
            .and_then(|raw| {
                let parsed = parse_flag(&raw);
                if parsed.is_none() {
                    tracing::warn!("Ignoring {ENV_NAMESPACE_FIELDS}={raw:?}: expected true or false");
                }
                parsed
            })
            .or_else(|| config.and_then(VaultConfig::namespace_fields))
            .unwrap_or(false);

        Self {
            database,
            primary_key,
            namespace_fields,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
