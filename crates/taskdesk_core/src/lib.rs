//! Core domain logic for TaskDesk.
//! This crate is the single source of truth for task and user invariants.

pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod events;
pub mod id_gen;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, CoreConfig, StorageConfig};
pub use controller::{
    ControllerError, ControllerResult, PresentationSurface, TaskController, TaskFilterKind,
    ViewIntent,
};
pub use error::ErrorKind;
pub use events::{ControllerEvent, EventBus, ServiceEvent};
pub use id_gen::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{NewTask, Priority, Task, TaskId, TaskPatch, TaskStatus};
pub use model::user::{NewUser, Role, User, UserId, UserPatch};
pub use model::validation::ValidationError;
pub use repo::task_repo::{TaskFilter, TaskQuery, TaskRepository, TaskSortField, TaskStatistics};
pub use repo::user_repo::{UserFilter, UserQuery, UserRepository, UserSortField};
pub use repo::{RepoError, RepoResult, SortOrder};
pub use service::{CacheSettings, ServiceError, ServiceResult, Services, TaskService, UserService};
pub use storage::{MemoryStorage, SqliteStorage, Storage, StorageError};
