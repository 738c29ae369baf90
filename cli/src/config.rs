//! Client configuration.
//!
//! Read from a JSON file (default `~/.config/lockbox/config.json`), then
//! overridden by command-line flags and their environment variables.

use lockbox_sync::{MAX_BATCH_SIZE, RemoteConfig, SyncConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or using the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse config file '{0}': {1}")]
    Parse(PathBuf, serde_json::Error),

    #[error("failed to write config file '{0}': {1}")]
    Write(PathBuf, std::io::Error),

    #[error("no server URL configured (set server_url or pass --server)")]
    MissingServerUrl,

    #[error("no token configured (set token, LOCKBOX_TOKEN or pass --token)")]
    MissingToken,
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Path to the local vault database.
    pub database_path: PathBuf,
    /// Base URL of the sync server.
    pub server_url: Option<String>,
    /// Bearer token of the account.
    pub token: Option<String>,
    /// Entries per sync request.
    pub batch_size: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_path: home_dir().join(".lockbox").join("vault.db"),
            server_url: None,
            token: None,
            batch_size: MAX_BATCH_SIZE,
            timeout_secs: 30,
        }
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub server_url: Option<String>,
    pub token: Option<String>,
}

impl ClientConfig {
    /// Loads the file at `path` (or the default path), falling back to
    /// defaults when it does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(Self::default_config_path, Path::to_path_buf);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(path, e))
    }

    /// Writes the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(path.into(), e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(path.into(), e))?;
        std::fs::write(path, json).map_err(|e| ConfigError::Write(path.into(), e))
    }

    /// Applies command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(path) = overrides.database_path {
            self.database_path = path;
        }
        if let Some(url) = overrides.server_url {
            self.server_url = Some(url);
        }
        if let Some(token) = overrides.token {
            self.token = Some(token);
        }
        self
    }

    /// Engine settings.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            batch_size: self.batch_size,
            timeout_ms: self.timeout_secs.saturating_mul(1000),
        }
    }

    /// Server connection settings. Fails if the URL or token is missing.
    pub fn remote_config(&self) -> Result<RemoteConfig, ConfigError> {
        let base_url = self
            .server_url
            .clone()
            .ok_or(ConfigError::MissingServerUrl)?;
        let token = self.token.clone().ok_or(ConfigError::MissingToken)?;
        Ok(RemoteConfig {
            base_url,
            token,
            timeout_secs: self.timeout_secs,
        })
    }

    /// Default config file path: `~/.config/lockbox/config.json`.
    pub fn default_config_path() -> PathBuf {
        home_dir().join(".config").join("lockbox").join("config.json")
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
