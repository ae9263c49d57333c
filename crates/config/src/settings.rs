// Application settings
// Loaded from ~/.config/creditmemo/settings.json

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use creditmemo_recon::PolicyTable;

use crate::APP_DIR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{path}: {source}")]
    Policies {
        path: PathBuf,
        source: creditmemo_recon::ReconError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Storage
    #[serde(rename = "store.path")]
    pub store_path: Option<PathBuf>, // None = platform data dir

    // Reconciliation
    #[serde(rename = "policies.path")]
    pub policies_path: Option<PathBuf>, // None = built-in table

    // Logging
    #[serde(rename = "log.filter")]
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            policies_path: None,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_or_default(&Self::config_path()).unwrap_or_else(|e| {
            warn!(error = %e, "using default settings");
            Self::default()
        })
    }

    /// Defaults when `path` does not exist; a file that exists must parse.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Load settings from `path`. Lines starting with `//` are comments.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(serde_json::from_str(&cleaned)?)
    }

    /// Save current settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(write_err)
    }

    /// Where the memo database lives.
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("memo.db")
        })
    }

    /// Conflict policy table: the configured TOML file, or the built-in one.
    pub fn policy_table(&self) -> Result<PolicyTable, ConfigError> {
        let Some(path) = &self.policies_path else {
            return Ok(PolicyTable::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        PolicyTable::from_toml(&raw).map_err(|source| ConfigError::Policies {
            path: path.clone(),
            source,
        })
    }
}
