//! Configuration loading from disk.
//!
//! The file carries a single `[settings]` table of registry keys and dynamic
//! `http_header_*` / `clickhouse_setting_*` keys:
//!
//! ```toml
//! [settings]
//! user = "reader"
//! max_open_connections = 20
//! session_db_roles = ["analyst", "auditor"]
//! clickhouse_setting_max_threads = 4
//! ```
//!
//! Scalars are stringified; arrays are stored with the list encoding.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::config::keys::encode_list;
use crate::config::schema::ClientConfig;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for '{key}', expected one of: {choices}")]
    InvalidChoice {
        key: String,
        value: String,
        choices: String,
    },

    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unsupported value type for '{0}'")]
    UnsupportedValue(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: BTreeMap<String, toml::Value>,
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = load_config_str(&content)?;
    tracing::debug!(path = %path.display(), entries = config.len(), "Configuration loaded");
    Ok(config)
}

/// Load and validate configuration from TOML text.
pub fn load_config_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;

    let mut config = ClientConfig::new();
    for (key, value) in file.settings {
        let value = stringify(&key, value)?;
        config.set(key, value);
    }

    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}

fn stringify(key: &str, value: toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => Ok(s),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Array(items) => {
            let items = items
                .into_iter()
                .map(|item| match item {
                    toml::Value::Array(_) | toml::Value::Table(_) => {
                        Err(ConfigError::UnsupportedValue(key.to_string()))
                    }
                    scalar => stringify(key, scalar),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(encode_list(items))
        }
        toml::Value::Datetime(_) | toml::Value::Table(_) => {
            Err(ConfigError::UnsupportedValue(key.to_string()))
        }
    }
}
