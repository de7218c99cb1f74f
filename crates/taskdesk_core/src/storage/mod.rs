//! Persistence collaborator contracts.
//!
//! # Responsibility
//! - Load and save whole named collections of plain JSON records.
//! - Keep backend details (memory map, SQLite) behind one trait.
//!
//! # Invariants
//! - `load` of an unknown key returns the caller's fallback unchanged.
//! - `save` replaces the full collection; there are no partial writes.

use crate::db::DbError;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence-layer failure.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    /// Stored payload is not a JSON array of records.
    Corrupt { key: String, message: String },
    Serialization(serde_json::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Corrupt { key, message } => {
                write!(f, "stored collection `{key}` is corrupt: {message}")
            }
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Corrupt { .. } => None,
            Self::Serialization(err) => Some(err),
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Opaque key/collection store treated as ground truth by repositories.
pub trait Storage {
    /// Returns every record stored under `key`, or `fallback` when absent.
    fn load(&self, key: &str, fallback: Vec<Value>) -> StorageResult<Vec<Value>>;
    /// Replaces the collection stored under `key`.
    fn save(&self, key: &str, records: &[Value]) -> StorageResult<()>;
}
