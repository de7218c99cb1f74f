//! Core use-case services.
//!
//! # Responsibility
//! - Enforce cross-entity rules on top of repositories.
//! - Emit domain events after successful writes and on failures.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Every failure is reported once as a `ServiceEvent::Error` and returned.

use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::id_gen::IdGenerator;
use crate::model::validation::ValidationError;
use crate::repo::task_repo::TaskRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use crate::storage::Storage;
use chrono::Duration;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub mod task_service;
pub mod user_service;

pub use task_service::TaskService;
pub use user_service::UserService;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-layer error.
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    /// A referenced entity does not exist.
    Reference { entity: &'static str, id: String },
    Validation(ValidationError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Repo(err) => err.kind(),
            Self::Reference { .. } => ErrorKind::Reference,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Reference { entity, id } => write!(f, "referenced {entity} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Reference { .. } => None,
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Cache lifetimes used when wiring repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub task_ttl: Duration,
    pub user_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            task_ttl: Duration::seconds(crate::cache::TASK_CACHE_TTL_SECS),
            user_ttl: Duration::seconds(crate::cache::USER_CACHE_TTL_SECS),
        }
    }
}

/// Task and user services sharing one storage, clock and id source.
pub struct Services {
    pub tasks: TaskService,
    pub users: UserService,
}

impl Services {
    pub fn new(
        storage: Rc<dyn Storage>,
        clock: Rc<dyn Clock>,
        ids: Rc<dyn IdGenerator>,
        cache: CacheSettings,
    ) -> Self {
        let users = Rc::new(UserRepository::new(
            storage.clone(),
            clock.clone(),
            ids.clone(),
            cache.user_ttl,
        ));
        let tasks = TaskRepository::new(storage, clock.clone(), ids.clone(), cache.task_ttl);
        Self {
            tasks: TaskService::new(tasks, users.clone(), ids, clock),
            users: UserService::new(users),
        }
    }
}
