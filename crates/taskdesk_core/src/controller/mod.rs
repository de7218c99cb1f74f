//! Controller layer: authorization, intent routing and view updates.
//!
//! # Responsibility
//! - Gate task mutations and reads on the signed-in user.
//! - Translate presentation intents into service calls.
//! - Push task lists, statistics and messages to the presentation surface.
//!
//! # Invariants
//! - A denied mutation never reaches the service layer.
//! - Every failure is reported once through `handle_error`, as both an
//!   event and an `Err`.

use crate::error::ErrorKind;
use crate::model::task::Priority;
use crate::service::ServiceError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod intent;
pub mod presentation;
pub mod task_controller;

pub use intent::{CreateTaskPayload, TaskUpdates, ViewIntent};
pub use presentation::PresentationSurface;
pub use task_controller::{can_modify, can_view, TaskController};

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Controller-layer error.
#[derive(Debug)]
pub enum ControllerError {
    /// No user is signed in.
    NotSignedIn,
    NotFound { entity: &'static str, id: String },
    Permission {
        user_id: String,
        task_id: String,
        action: &'static str,
    },
    /// The intent or its payload could not be understood.
    InvalidRequest(String),
    Service(ServiceError),
}

impl ControllerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotSignedIn | Self::Permission { .. } => ErrorKind::Permission,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Service(err) => err.kind(),
        }
    }
}

impl Display for ControllerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "no user is signed in"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Permission {
                user_id,
                task_id,
                action,
            } => write!(f, "user {user_id} may not {action} task {task_id}"),
            Self::InvalidRequest(message) => write!(f, "invalid request: {message}"),
            Self::Service(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Service(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ServiceError> for ControllerError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

/// Task list view selected in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "filter", content = "value", rename_all = "lowercase")]
pub enum TaskFilterKind {
    #[default]
    All,
    Pending,
    Completed,
    Overdue,
    Priority(Priority),
    Category(String),
    /// Tasks assigned to the signed-in user.
    Assigned,
    /// Display label for search results; never remembered as the active filter.
    Search(String),
}

impl TaskFilterKind {
    /// Builds a kind from the `(filter, value)` pair a view sends.
    ///
    /// `search` is not accepted here; searches go through their own intent.
    pub fn from_parts(filter: &str, value: Option<&str>) -> Option<Self> {
        match filter.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "overdue" => Some(Self::Overdue),
            "assigned" => Some(Self::Assigned),
            "priority" => value.and_then(Priority::parse).map(Self::Priority),
            "category" => value
                .map(str::trim)
                .filter(|category| !category.is_empty())
                .map(|category| Self::Category(category.to_string())),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
            Self::Priority(_) => "priority",
            Self::Category(_) => "category",
            Self::Assigned => "assigned",
            Self::Search(_) => "search",
        }
    }
}

impl Display for TaskFilterKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Priority(priority) => write!(f, "priority:{priority}"),
            Self::Category(category) => write!(f, "category:{category}"),
            Self::Search(_) => f.write_str("search"),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ControllerError, TaskFilterKind};
    use crate::error::ErrorKind;
    use crate::model::task::Priority;

    #[test]
    fn filter_kind_parses_parts() {
        assert_eq!(TaskFilterKind::from_parts("ALL", None), Some(TaskFilterKind::All));
        assert_eq!(
            TaskFilterKind::from_parts("priority", Some("high")),
            Some(TaskFilterKind::Priority(Priority::High))
        );
        assert_eq!(
            TaskFilterKind::from_parts("category", Some(" work ")),
            Some(TaskFilterKind::Category("work".to_string()))
        );
        assert_eq!(TaskFilterKind::from_parts("priority", None), None);
        assert_eq!(TaskFilterKind::from_parts("category", Some("  ")), None);
        assert_eq!(TaskFilterKind::from_parts("search", Some("x")), None);
    }

    #[test]
    fn filter_kind_display_omits_search_text() {
        assert_eq!(TaskFilterKind::Priority(Priority::Low).to_string(), "priority:low");
        assert_eq!(TaskFilterKind::Search("secret".to_string()).to_string(), "search");
    }

    #[test]
    fn error_kinds_are_classified() {
        assert_eq!(ControllerError::NotSignedIn.kind(), ErrorKind::Permission);
        assert_eq!(
            ControllerError::NotFound {
                entity: "task",
                id: "t1".to_string()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ControllerError::InvalidRequest("bad".to_string()).kind(),
            ErrorKind::InvalidRequest
        );
    }
}
