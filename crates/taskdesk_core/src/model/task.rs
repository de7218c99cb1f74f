//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record and its persisted wire shape.
//! - Own every task mutation through validating mutators.
//! - Compute derived state (`is_overdue`, `progress`) on demand.
//!
//! # Invariants
//! - `id`, `user_id` and `created_at` never change after construction.
//! - `completed == (status == TaskStatus::Completed)`, and `completed_at` is
//!   set exactly while the task is completed.
//! - `tags` are trimmed lowercase and unique; `dependencies` never contain
//!   the task's own id.
//! - Every successful mutation moves `updated_at` strictly forward.

use crate::model::user::UserId;
use crate::model::validation::{
    normalize_tag, normalize_tags, require_hours, require_max_len, require_text, ValidationError,
    ValidationResult,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

pub type TaskId = String;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const CATEGORY_MAX_CHARS: usize = 50;
pub const NOTE_MAX_CHARS: usize = 1000;
pub const DEFAULT_CATEGORY: &str = "general";

/// Task urgency, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    /// Numeric rank used for sorting; higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task workflow state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Blocked,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in-progress" | "in_progress" => Some(Self::InProgress),
            "blocked" => Some(Self::Blocked),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text note appended to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNote {
    pub id: String,
    pub content: String,
    pub author: UserId,
    pub created_at: DateTime<Utc>,
}

/// Reference to an external file attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    pub added_at: DateTime<Utc>,
}

/// Creation draft for a task.
///
/// `id` stays `None` for normal creation; the repository assigns one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub id: Option<TaskId>,
    pub title: String,
    pub description: String,
    pub user_id: UserId,
    /// Defaults to the owner.
    pub assigned_to: Option<UserId>,
    pub priority: Priority,
    /// Defaults to `general`.
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub dependencies: Vec<TaskId>,
}

impl NewTask {
    pub fn new(user_id: impl Into<UserId>, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// One closed, validated mutation of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPatch {
    Title(String),
    Description(String),
    Priority(Priority),
    Category(String),
    Tags(Vec<String>),
    AddTag(String),
    RemoveTag(String),
    DueDate(Option<DateTime<Utc>>),
    EstimatedHours(Option<f64>),
    ActualHours(Option<f64>),
    AddTimeSpent(f64),
    Status(TaskStatus),
    Completed(bool),
    AssignedTo(UserId),
    AddNote(TaskNote),
    RemoveNote(String),
    AddAttachment(Attachment),
    RemoveAttachment(String),
    AddDependency(TaskId),
    RemoveDependency(TaskId),
}

impl TaskPatch {
    /// Stable field name for diagnostics.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Description(_) => "description",
            Self::Priority(_) => "priority",
            Self::Category(_) => "category",
            Self::Tags(_) | Self::AddTag(_) | Self::RemoveTag(_) => "tags",
            Self::DueDate(_) => "dueDate",
            Self::EstimatedHours(_) => "estimatedHours",
            Self::ActualHours(_) | Self::AddTimeSpent(_) => "actualHours",
            Self::Status(_) => "status",
            Self::Completed(_) => "completed",
            Self::AssignedTo(_) => "assignedTo",
            Self::AddNote(_) | Self::RemoveNote(_) => "notes",
            Self::AddAttachment(_) | Self::RemoveAttachment(_) => "attachments",
            Self::AddDependency(_) | Self::RemoveDependency(_) => "dependencies",
        }
    }
}

/// Canonical task record.
///
/// Serialized with camelCase keys; this is the persisted record shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: TaskId,
    title: String,
    #[serde(default)]
    description: String,
    user_id: UserId,
    assigned_to: UserId,
    priority: Priority,
    category: String,
    #[serde(default)]
    tags: BTreeSet<String>,
    completed: bool,
    status: TaskStatus,
    due_date: Option<DateTime<Utc>>,
    estimated_hours: Option<f64>,
    actual_hours: Option<f64>,
    #[serde(default)]
    notes: Vec<TaskNote>,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    dependencies: BTreeSet<TaskId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Builds a validated task from a creation draft.
    ///
    /// # Errors
    /// - Returns `ValidationError` for blank/oversized text, negative hours
    ///   or a self-dependency.
    pub fn create(draft: NewTask, now: DateTime<Utc>) -> ValidationResult<Self> {
        let user_id = draft.user_id.trim().to_string();
        let task = Self {
            id: draft.id.map(|id| id.trim().to_string()).unwrap_or_default(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            assigned_to: draft
                .assigned_to
                .map(|id| id.trim().to_string())
                .unwrap_or_else(|| user_id.clone()),
            user_id,
            priority: draft.priority,
            category: draft
                .category
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            tags: normalize_tags(&draft.tags),
            completed: false,
            status: TaskStatus::Pending,
            due_date: draft.due_date,
            estimated_hours: draft.estimated_hours,
            actual_hours: None,
            notes: Vec::new(),
            attachments: Vec::new(),
            dependencies: draft
                .dependencies
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        task.validate()?;
        Ok(task)
    }

    /// Checks every field-level invariant.
    ///
    /// Used at construction and again when hydrating persisted rows.
    pub fn validate(&self) -> ValidationResult<()> {
        require_text("title", &self.title)?;
        require_max_len("title", &self.title, TITLE_MAX_CHARS)?;
        require_max_len("description", &self.description, DESCRIPTION_MAX_CHARS)?;
        require_text("userId", &self.user_id)?;
        require_text("assignedTo", &self.assigned_to)?;
        require_text("category", &self.category)?;
        require_max_len("category", &self.category, CATEGORY_MAX_CHARS)?;
        require_hours("estimatedHours", self.estimated_hours)?;
        require_hours("actualHours", self.actual_hours)?;

        if !self.id.is_empty() && self.dependencies.contains(&self.id) {
            return Err(ValidationError::SelfDependency(self.id.clone()));
        }
        if self.completed != (self.status == TaskStatus::Completed)
            || self.completed != self.completed_at.is_some()
        {
            return Err(ValidationError::InconsistentCompletion);
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn assigned_to(&self) -> &str {
        &self.assigned_to
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn estimated_hours(&self) -> Option<f64> {
        self.estimated_hours
    }

    pub fn actual_hours(&self) -> Option<f64> {
        self.actual_hours
    }

    pub fn notes(&self) -> &[TaskNote] {
        &self.notes
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn dependencies(&self) -> &BTreeSet<TaskId> {
        &self.dependencies
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// True when a due date has passed and the task is still open.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Completion percentage in `0.0..=100.0`.
    pub fn progress(&self) -> f64 {
        if self.completed {
            return 100.0;
        }
        match (self.estimated_hours, self.actual_hours) {
            (Some(estimate), actual) if estimate > 0.0 => {
                (actual.unwrap_or(0.0) / estimate * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        normalize_tag(tag).is_some_and(|tag| self.tags.contains(&tag))
    }

    pub fn depends_on(&self, task_id: &str) -> bool {
        self.dependencies.contains(task_id)
    }

    /// Case-insensitive substring match over title, description and tags.
    ///
    /// `needle` must already be lowercase.
    pub fn matches_text(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.tags.iter().any(|tag| tag.contains(needle))
    }

    pub fn set_title(&mut self, title: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let title = title.trim();
        require_text("title", title)?;
        require_max_len("title", title, TITLE_MAX_CHARS)?;
        self.title = title.to_string();
        self.touch(now);
        Ok(())
    }

    pub fn set_description(
        &mut self,
        description: &str,
        now: DateTime<Utc>,
    ) -> ValidationResult<()> {
        let description = description.trim();
        require_max_len("description", description, DESCRIPTION_MAX_CHARS)?;
        self.description = description.to_string();
        self.touch(now);
        Ok(())
    }

    pub fn set_priority(&mut self, priority: Priority, now: DateTime<Utc>) {
        self.priority = priority;
        self.touch(now);
    }

    pub fn set_category(&mut self, category: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let category = category.trim().to_lowercase();
        require_text("category", &category)?;
        require_max_len("category", &category, CATEGORY_MAX_CHARS)?;
        self.category = category;
        self.touch(now);
        Ok(())
    }

    /// Replaces the full tag set.
    pub fn set_tags<S: AsRef<str>>(&mut self, tags: &[S], now: DateTime<Utc>) {
        self.tags = normalize_tags(tags);
        self.touch(now);
    }

    pub fn add_tag(&mut self, tag: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let tag = normalize_tag(tag).ok_or(ValidationError::MissingField("tag"))?;
        self.tags.insert(tag);
        self.touch(now);
        Ok(())
    }

    /// Returns whether the tag was present.
    pub fn remove_tag(&mut self, tag: &str, now: DateTime<Utc>) -> bool {
        let removed = normalize_tag(tag).is_some_and(|tag| self.tags.remove(&tag));
        if removed {
            self.touch(now);
        }
        removed
    }

    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.due_date = due_date;
        self.touch(now);
    }

    pub fn set_estimated_hours(
        &mut self,
        hours: Option<f64>,
        now: DateTime<Utc>,
    ) -> ValidationResult<()> {
        require_hours("estimatedHours", hours)?;
        self.estimated_hours = hours;
        self.touch(now);
        Ok(())
    }

    pub fn set_actual_hours(
        &mut self,
        hours: Option<f64>,
        now: DateTime<Utc>,
    ) -> ValidationResult<()> {
        require_hours("actualHours", hours)?;
        self.actual_hours = hours;
        self.touch(now);
        Ok(())
    }

    /// Adds logged hours on top of `actual_hours`.
    pub fn add_time_spent(&mut self, hours: f64, now: DateTime<Utc>) -> ValidationResult<()> {
        require_hours("hours", Some(hours))?;
        self.actual_hours = Some(self.actual_hours.unwrap_or(0.0) + hours);
        self.touch(now);
        Ok(())
    }

    /// Moves the workflow state, keeping completion fields in step.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        let completed = status == TaskStatus::Completed;
        if completed && !self.completed {
            self.completed_at = Some(now);
        } else if !completed {
            self.completed_at = None;
        }
        self.status = status;
        self.completed = completed;
        self.touch(now);
    }

    pub fn mark_complete(&mut self, now: DateTime<Utc>) {
        self.set_status(TaskStatus::Completed, now);
    }

    /// Reopens a completed task as `pending`; any other status is kept.
    pub fn mark_incomplete(&mut self, now: DateTime<Utc>) {
        if self.completed {
            self.set_status(TaskStatus::Pending, now);
        } else {
            self.touch(now);
        }
    }

    pub fn toggle_completion(&mut self, now: DateTime<Utc>) {
        if self.completed {
            self.mark_incomplete(now);
        } else {
            self.mark_complete(now);
        }
    }

    pub fn assign_to(&mut self, user_id: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let user_id = user_id.trim();
        require_text("assignedTo", user_id)?;
        self.assigned_to = user_id.to_string();
        self.touch(now);
        Ok(())
    }

    pub fn add_note(&mut self, note: TaskNote, now: DateTime<Utc>) -> ValidationResult<()> {
        require_text("note.id", &note.id)?;
        require_text("note.content", &note.content)?;
        require_max_len("note.content", &note.content, NOTE_MAX_CHARS)?;
        require_text("note.author", &note.author)?;
        self.notes.push(note);
        self.touch(now);
        Ok(())
    }

    /// Returns whether a note with `note_id` existed.
    pub fn remove_note(&mut self, note_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != note_id);
        let removed = self.notes.len() != before;
        if removed {
            self.touch(now);
        }
        removed
    }

    pub fn add_attachment(
        &mut self,
        attachment: Attachment,
        now: DateTime<Utc>,
    ) -> ValidationResult<()> {
        require_text("attachment.id", &attachment.id)?;
        require_text("attachment.name", &attachment.name)?;
        require_text("attachment.url", &attachment.url)?;
        self.attachments.push(attachment);
        self.touch(now);
        Ok(())
    }

    pub fn remove_attachment(&mut self, attachment_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|item| item.id != attachment_id);
        let removed = self.attachments.len() != before;
        if removed {
            self.touch(now);
        }
        removed
    }

    pub fn add_dependency(&mut self, task_id: &str, now: DateTime<Utc>) -> ValidationResult<()> {
        let task_id = task_id.trim();
        require_text("dependency", task_id)?;
        if task_id == self.id {
            return Err(ValidationError::SelfDependency(self.id.clone()));
        }
        self.dependencies.insert(task_id.to_string());
        self.touch(now);
        Ok(())
    }

    pub fn remove_dependency(&mut self, task_id: &str, now: DateTime<Utc>) -> bool {
        let removed = self.dependencies.remove(task_id);
        if removed {
            self.touch(now);
        }
        removed
    }

    /// Routes one patch to its dedicated mutator.
    pub fn apply_patch(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> ValidationResult<()> {
        match patch {
            TaskPatch::Title(value) => self.set_title(&value, now)?,
            TaskPatch::Description(value) => self.set_description(&value, now)?,
            TaskPatch::Priority(value) => self.set_priority(value, now),
            TaskPatch::Category(value) => self.set_category(&value, now)?,
            TaskPatch::Tags(values) => self.set_tags(&values, now),
            TaskPatch::AddTag(value) => self.add_tag(&value, now)?,
            TaskPatch::RemoveTag(value) => {
                self.remove_tag(&value, now);
            }
            TaskPatch::DueDate(value) => self.set_due_date(value, now),
            TaskPatch::EstimatedHours(value) => self.set_estimated_hours(value, now)?,
            TaskPatch::ActualHours(value) => self.set_actual_hours(value, now)?,
            TaskPatch::AddTimeSpent(hours) => self.add_time_spent(hours, now)?,
            TaskPatch::Status(value) => self.set_status(value, now),
            TaskPatch::Completed(true) => self.mark_complete(now),
            TaskPatch::Completed(false) => self.mark_incomplete(now),
            TaskPatch::AssignedTo(value) => self.assign_to(&value, now)?,
            TaskPatch::AddNote(note) => self.add_note(note, now)?,
            TaskPatch::RemoveNote(note_id) => {
                self.remove_note(&note_id, now);
            }
            TaskPatch::AddAttachment(attachment) => self.add_attachment(attachment, now)?,
            TaskPatch::RemoveAttachment(attachment_id) => {
                self.remove_attachment(&attachment_id, now);
            }
            TaskPatch::AddDependency(task_id) => self.add_dependency(&task_id, now)?,
            TaskPatch::RemoveDependency(task_id) => {
                self.remove_dependency(&task_id, now);
            }
        }
        Ok(())
    }

    /// Sets the id only while it is still empty.
    pub(crate) fn assign_id(&mut self, id: TaskId) {
        if self.id.is_empty() {
            self.id = id;
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::milliseconds(1)
        };
    }
}
