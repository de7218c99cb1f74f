//! Inbound presentation intents and their wire payloads.
//!
//! # Invariants
//! - `ViewIntent::parse` is the single table mapping event kinds to
//!   intents; unknown kinds yield `Ok(None)`.
//! - Payload keys are camelCase, matching the persisted record shape.

use crate::controller::TaskFilterKind;
use crate::model::task::{NewTask, Priority, TaskPatch, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Typed intent emitted by the presentation surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewIntent {
    CreateTask(CreateTaskPayload),
    UpdateTask { task_id: String, updates: TaskUpdates },
    DeleteTask { task_id: String },
    ToggleCompletion { task_id: String },
    Filter(TaskFilterKind),
    Search { query: String },
    AddTime { task_id: String, hours: f64 },
    AssignTask { task_id: String, user_id: String },
    AddNote { task_id: String, content: String },
    Refresh,
}

impl ViewIntent {
    /// Wire name of the intent kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTask(_) => "createTaskRequested",
            Self::UpdateTask { .. } => "updateTaskRequested",
            Self::DeleteTask { .. } => "deleteTaskRequested",
            Self::ToggleCompletion { .. } => "toggleCompletionRequested",
            Self::Filter(_) => "filterRequested",
            Self::Search { .. } => "searchRequested",
            Self::AddTime { .. } => "addTimeRequested",
            Self::AssignTask { .. } => "assignTaskRequested",
            Self::AddNote { .. } => "addNoteRequested",
            Self::Refresh => "refreshRequested",
        }
    }

    /// Parses one raw `(kind, payload)` event.
    ///
    /// # Errors
    /// - Returns the JSON error when a known kind carries a malformed payload.
    pub fn parse(kind: &str, payload: Value) -> Result<Option<Self>, serde_json::Error> {
        let intent = match kind {
            "createTaskRequested" => Self::CreateTask(serde_json::from_value(payload)?),
            "updateTaskRequested" => {
                let payload: UpdateTaskPayload = serde_json::from_value(payload)?;
                Self::UpdateTask {
                    task_id: payload.task_id,
                    updates: payload.updates,
                }
            }
            "deleteTaskRequested" => Self::DeleteTask {
                task_id: serde_json::from_value::<TaskRef>(payload)?.task_id,
            },
            "toggleCompletionRequested" => Self::ToggleCompletion {
                task_id: serde_json::from_value::<TaskRef>(payload)?.task_id,
            },
            "filterRequested" => {
                let payload: FilterPayload = serde_json::from_value(payload)?;
                match TaskFilterKind::from_parts(&payload.filter, payload.value.as_deref()) {
                    Some(kind) => Self::Filter(kind),
                    None => {
                        return Err(serde::de::Error::custom(format!(
                            "unknown filter `{}`",
                            payload.filter
                        )))
                    }
                }
            }
            "searchRequested" => Self::Search {
                query: serde_json::from_value::<SearchPayload>(payload)?.query,
            },
            "addTimeRequested" => {
                let payload: AddTimePayload = serde_json::from_value(payload)?;
                Self::AddTime {
                    task_id: payload.task_id,
                    hours: payload.hours,
                }
            }
            "assignTaskRequested" => {
                let payload: AssignPayload = serde_json::from_value(payload)?;
                Self::AssignTask {
                    task_id: payload.task_id,
                    user_id: payload.user_id,
                }
            }
            "addNoteRequested" => {
                let payload: AddNotePayload = serde_json::from_value(payload)?;
                Self::AddNote {
                    task_id: payload.task_id,
                    content: payload.content,
                }
            }
            "refreshRequested" => Self::Refresh,
            _ => return Ok(None),
        };
        Ok(Some(intent))
    }
}

/// Form payload for task creation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl CreateTaskPayload {
    /// Shapes the form into a draft owned by `user_id`.
    pub fn into_draft(self, user_id: &str) -> NewTask {
        NewTask {
            id: None,
            title: self.title,
            description: self.description,
            user_id: user_id.to_string(),
            assigned_to: self.assigned_to.filter(|value| !value.trim().is_empty()),
            priority: self.priority.unwrap_or_default(),
            category: self.category,
            tags: self.tags,
            due_date: self.due_date,
            estimated_hours: self.estimated_hours,
            dependencies: self.dependencies,
        }
    }
}

/// Partial field updates from an edit form; absent keys are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdates {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// `Some(None)` clears the due date.
    #[serde(default, deserialize_with = "present_or_null")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl TaskUpdates {
    /// Converts present fields into patches, in declaration order.
    pub fn into_patches(self) -> Vec<TaskPatch> {
        let mut patches = Vec::new();
        if let Some(value) = self.title {
            patches.push(TaskPatch::Title(value));
        }
        if let Some(value) = self.description {
            patches.push(TaskPatch::Description(value));
        }
        if let Some(value) = self.priority {
            patches.push(TaskPatch::Priority(value));
        }
        if let Some(value) = self.category {
            patches.push(TaskPatch::Category(value));
        }
        if let Some(value) = self.tags {
            patches.push(TaskPatch::Tags(value));
        }
        if let Some(value) = self.due_date {
            patches.push(TaskPatch::DueDate(value));
        }
        if let Some(value) = self.estimated_hours {
            patches.push(TaskPatch::EstimatedHours(value));
        }
        if let Some(value) = self.status {
            patches.push(TaskPatch::Status(value));
        }
        if let Some(value) = self.completed {
            patches.push(TaskPatch::Completed(value));
        }
        if let Some(value) = self.assigned_to {
            patches.push(TaskPatch::AssignedTo(value));
        }
        patches
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskPayload {
    task_id: String,
    #[serde(default)]
    updates: TaskUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRef {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct FilterPayload {
    filter: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTimePayload {
    task_id: String,
    hours: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignPayload {
    task_id: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddNotePayload {
    task_id: String,
    content: String,
}

// Distinguishes an explicit `null` (clear) from an absent key (keep).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
