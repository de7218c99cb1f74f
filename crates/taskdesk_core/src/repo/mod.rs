//! Repository layer: generic cached CRUD plus per-entity finders.
//!
//! # Responsibility
//! - Be the only read/write path to a named entity collection.
//! - Keep the per-id cache coherent with this instance's own writes.
//!
//! # Invariants
//! - Write paths validate entities before persistence.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - Lookup misses are `None`/`false`, never errors.

use crate::error::ErrorKind;
use crate::model::validation::{ValidationError, ValidationResult};
use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod query;
pub mod repository;
pub mod task_repo;
pub mod user_repo;

pub use query::{QueryOptions, Queryable, SortOrder, SortValue};
pub use repository::Repository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    /// Id or unique key already taken in the collection.
    Duplicate {
        collection: &'static str,
        field: &'static str,
        value: String,
    },
    Storage(StorageError),
    /// A persisted row could not be hydrated.
    InvalidData(String),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Storage(_) | Self::InvalidData(_) => ErrorKind::Storage,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate {
                collection,
                field,
                value,
            } => write!(f, "{collection} already contains {field} `{value}`"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Duplicate { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Contract an entity type fulfils to be stored by `Repository`.
pub trait Entity: Queryable + Clone + Serialize + DeserializeOwned {
    type Patch;

    /// Storage key of the collection.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Sets the id; a no-op once the entity already has one.
    fn assign_id(&mut self, id: String);

    fn validate(&self) -> ValidationResult<()>;

    fn apply_patch(&mut self, patch: Self::Patch, now: DateTime<Utc>) -> ValidationResult<()>;

    /// `(field, normalized value)` pairs that must be unique in the collection.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}
