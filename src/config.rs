//! Configuration: document-type registry and search settings.
//!
//! Looked up in this order:
//!
//! 1. an explicit path (`--config`),
//! 2. the `COLLECTIE_CONFIG` environment variable,
//! 3. `config.toml` in the platform config directory,
//! 4. the built-in default (`config/default.toml`).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::doctype::{DocType, Registry, RegistryError};

pub const CONFIG_ENV: &str = "COLLECTIE_CONFIG";

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("Invalid document types: {0}")]
    Registry(#[from] RegistryError),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default = "default_suggest_size")]
    suggest_size: usize,
    #[serde(default)]
    suggest_fields: Vec<String>,
    doctypes: Vec<DocType>,
}

fn default_page_size() -> usize {
    10
}

fn default_suggest_size() -> usize {
    5
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Results per page.
    pub page_size: usize,
    /// Term suggestions requested per token and field.
    pub suggest_size: usize,
    /// Fields whose term dictionaries feed "did you mean".
    pub suggest_fields: Vec<String>,
    pub registry: Registry,
}

impl Config {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(s)?;
        if raw.page_size == 0 {
            return Err(ConfigError::Validation("page_size must be at least 1".into()));
        }
        let registry = Registry::new(raw.doctypes)?;
        let known = registry.schema_fields();
        if let Some(unknown) = raw
            .suggest_fields
            .iter()
            .find(|f| !known.contains(f.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "suggest field `{unknown}` is not a field of any document type"
            )));
        }
        Ok(Self {
            page_size: raw.page_size,
            suggest_size: raw.suggest_size,
            suggest_fields: raw.suggest_fields,
            registry,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolve and load the configuration; see the module docs for the order.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), source = "flag", "config_load");
            return Self::from_path(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            tracing::debug!(path = %path.display(), source = "env", "config_load");
            return Self::from_path(&path);
        }
        if let Some(path) = default_config_path().filter(|p| p.exists()) {
            tracing::debug!(path = %path.display(), source = "config_dir", "config_load");
            return Self::from_path(&path);
        }
        tracing::debug!(source = "builtin", "config_load");
        Self::builtin()
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("nl", "collectiegroesbeek", "collectie-search")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
