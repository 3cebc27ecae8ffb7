//! Configuration management
//!
//! Resolves where the app credentials and the two token stores live, and how
//! long an interactive sign-in may wait. Layers, lowest first: built-in
//! defaults under `~/.tidings/`, an optional JSON file, then environment
//! variables. Command-line flags are applied by the caller on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::auth::DEFAULT_AUTH_TIMEOUT;
use crate::common::tidings_path;

pub const ENV_CREDENTIALS: &str = "TIDINGS_CREDENTIALS";
pub const ENV_GMAIL_TOKEN: &str = "TIDINGS_GMAIL_TOKEN";
pub const ENV_CALENDAR_TOKEN: &str = "TIDINGS_CALENDAR_TOKEN";
pub const ENV_AUTH_TIMEOUT: &str = "TIDINGS_AUTH_TIMEOUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidingsConfig {
    /// Google client-secret descriptor for the registered application.
    pub credentials_path: PathBuf,
    pub gmail_token_path: PathBuf,
    pub calendar_token_path: PathBuf,
    pub auth_timeout_secs: u64,
}

impl Default for TidingsConfig {
    fn default() -> Self {
        Self {
            credentials_path: tidings_path("credentials.json"),
            gmail_token_path: tidings_path("gmail_token.json"),
            calendar_token_path: tidings_path("calendar_token.json"),
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT.as_secs(),
        }
    }
}

impl TidingsConfig {
    pub fn default_path() -> PathBuf {
        tidings_path("config.json")
    }

    /// Defaults overlaid with a config file.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    debug!("No config file at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Fields missing from the file keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_CREDENTIALS) {
            self.credentials_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_GMAIL_TOKEN) {
            self.gmail_token_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_CALENDAR_TOKEN) {
            self.calendar_token_path = PathBuf::from(path);
        }
        if let Some(value) = get(ENV_AUTH_TIMEOUT) {
            self.auth_timeout_secs = parse_timeout(ENV_AUTH_TIMEOUT, &value)?;
        }
        Ok(())
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

fn parse_timeout(key: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
