//! Typed runtime configuration.
//!
//! # Responsibility
//! - Describe backend selection, logging and refresh tuning in one struct.
//! - Load that struct from a JSON file with defaults for missing keys.
//!
//! # Invariants
//! - A validated config never carries a zero seed count or stress count.

use crate::logging::normalize_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Players inserted by a refresh that finds the table empty.
pub const SEED_PLAYER_COUNT: usize = 8;

/// Refreshes run by one stress test.
pub const STRESS_REPETITIONS: usize = 50;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub backend: StoreBackend,
    /// SQLite file; `None` opens a private in-memory database.
    pub database_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    pub seed_player_count: usize,
    pub stress_repetitions: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            database_path: None,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            seed_player_count: SEED_PLAYER_COUNT,
            stress_repetitions: STRESS_REPETITIONS,
        }
    }
}

impl CoreConfig {
    /// Reads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.seed_player_count == 0 {
            return Err(ConfigError::Invalid(
                "seed_player_count must be at least 1".to_string(),
            ));
        }
        if self.stress_repetitions == 0 {
            return Err(ConfigError::Invalid(
                "stress_repetitions must be at least 1".to_string(),
            ));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if self.backend == StoreBackend::Memory && self.database_path.is_some() {
            return Err(ConfigError::Invalid(
                "database_path is only meaningful for the sqlite backend".to_string(),
            ));
        }
        Ok(())
    }
}
