//! Event payloads emitted by the service and controller layers.

use crate::controller::TaskFilterKind;
use crate::error::ErrorKind;
use crate::model::task::{Task, TaskId};
use crate::model::user::{User, UserId};
use crate::repo::task_repo::TaskStatistics;
use chrono::{DateTime, Utc};

/// Domain change emitted by services after a successful write, or on failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskDeleted { task_id: TaskId },
    UserCreated(User),
    UserUpdated(User),
    UserDeleted { user_id: UserId },
    Error {
        operation: &'static str,
        kind: ErrorKind,
        error: String,
    },
}

impl ServiceEvent {
    /// Stable event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated(_) => "taskCreated",
            Self::TaskUpdated(_) => "taskUpdated",
            Self::TaskDeleted { .. } => "taskDeleted",
            Self::UserCreated(_) => "userCreated",
            Self::UserUpdated(_) => "userUpdated",
            Self::UserDeleted { .. } => "userDeleted",
            Self::Error { .. } => "error",
        }
    }

    /// True for task create/update/delete, which invalidate any task list view.
    pub fn changes_tasks(&self) -> bool {
        matches!(
            self,
            Self::TaskCreated(_) | Self::TaskUpdated(_) | Self::TaskDeleted { .. }
        )
    }
}

/// Notification emitted by the controller to its own subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskDeleted { task_id: TaskId },
    StatsUpdated(TaskStatistics),
    FilterChanged(TaskFilterKind),
    Error {
        operation: &'static str,
        kind: ErrorKind,
        message: String,
        timestamp: DateTime<Utc>,
    },
}
