//! Runtime configuration for the core.
//!
//! # Responsibility
//! - Carry the device settings the sync engine and logging need.
//! - Load them from a JSON file with per-field defaults.
//!
//! # Invariants
//! - A missing file yields defaults; a malformed file is an error.
//! - `utc_offset_minutes` stays within +-14 hours.

use crate::logging::default_log_level;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;
const DEFAULT_DB_FILE_NAME: &str = "lifeplan.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read config: {err}"),
            Self::Parse(err) => write!(f, "cannot parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Core settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Device offset from UTC; defines "today" for task reconciliation.
    pub utc_offset_minutes: i32,
    pub log_level: String,
    /// Absolute directory for rolling log files. No file logging when unset.
    pub log_dir: Option<PathBuf>,
    pub db_file_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
        }
    }
}

impl SyncConfig {
    /// Loads config from `path`, falling back to defaults when absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "event=config_load module=config status=skip reason=missing path={}",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config = Self::from_json_str(&text)?;
        info!(
            "event=config_load module=config status=ok path={}",
            path.display()
        );
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes {} outside +-{MAX_UTC_OFFSET_MINUTES}",
                self.utc_offset_minutes
            )));
        }
        if self.db_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("db_file_name cannot be empty".to_string()));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}
