//! Core runtime configuration.
//!
//! Every field has a default, so `{}` is a valid configuration. Validation is
//! explicit: callers run `validate()` (or use `load`/`from_json_str`, which do)
//! before wiring storage and services from the values.

use crate::cache::{TASK_CACHE_TTL_SECS, USER_CACHE_TTL_SECS};
use crate::logging::{default_log_level, init_logging, normalize_level};
use crate::service::CacheSettings;
use crate::storage::{MemoryStorage, SqliteStorage, Storage, StorageError};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Upper bound for cache lifetimes: one year.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Persistence backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local maps; nothing survives a restart.
    #[default]
    Memory,
    /// One SQLite file holding every collection.
    Sqlite { path: PathBuf },
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// File logging is skipped when unset.
    pub log_dir: Option<PathBuf>,
    pub storage: StorageConfig,
    pub task_cache_ttl_secs: u64,
    pub user_cache_ttl_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            storage: StorageConfig::Memory,
            task_cache_ttl_secs: TASK_CACHE_TTL_SECS as u64,
            user_cache_ttl_secs: USER_CACHE_TTL_SECS as u64,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))?;

        if let Some(dir) = self.log_dir.as_ref() {
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir.clone()));
            }
        }

        if let StorageConfig::Sqlite { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptySqlitePath);
            }
        }

        check_ttl("task_cache_ttl_secs", self.task_cache_ttl_secs)?;
        check_ttl("user_cache_ttl_secs", self.user_cache_ttl_secs)?;
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            task_ttl: ttl_duration(self.task_cache_ttl_secs),
            user_ttl: ttl_duration(self.user_cache_ttl_secs),
        }
    }

    /// Opens the configured backend.
    pub fn open_storage(&self) -> Result<Rc<dyn Storage>, ConfigError> {
        let storage: Rc<dyn Storage> = match &self.storage {
            StorageConfig::Memory => Rc::new(MemoryStorage::new()),
            StorageConfig::Sqlite { path } => {
                Rc::new(SqliteStorage::open(path).map_err(ConfigError::Storage)?)
            }
        };
        Ok(storage)
    }

    /// Starts file logging when `log_dir` is set; returns whether it did.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(dir) = self.log_dir.as_ref() else {
            return Ok(false);
        };
        let dir = dir
            .to_str()
            .ok_or_else(|| ConfigError::Logging("log_dir is not valid UTF-8".to_string()))?;
        init_logging(&self.log_level, dir).map_err(ConfigError::Logging)?;
        Ok(true)
    }
}

fn check_ttl(field: &'static str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_CACHE_TTL_SECS {
        return Err(ConfigError::InvalidTtl { field, secs });
    }
    Ok(())
}

fn ttl_duration(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_CACHE_TTL_SECS) as i64)
}

/// Configuration load/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
    EmptySqlitePath,
    InvalidTtl { field: &'static str, secs: u64 },
    Storage(StorageError),
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidLogLevel(level) => write!(f, "unsupported log level `{level}`"),
            Self::RelativeLogDir(dir) => {
                write!(f, "log_dir must be absolute, got `{}`", dir.display())
            }
            Self::EmptySqlitePath => write!(f, "sqlite storage requires a non-empty path"),
            Self::InvalidTtl { field, secs } => write!(
                f,
                "{field} must be between 1 and {MAX_CACHE_TTL_SECS} seconds, got {secs}"
            ),
            Self::Storage(err) => write!(f, "failed to open storage: {err}"),
            Self::Logging(message) => write!(f, "failed to start logging: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}
