//! Task repository finders and statistics.
//!
//! # Responsibility
//! - Describe how tasks are filtered, sorted and uniquely keyed.
//! - Provide task-specific finders as `find_all` compositions.
//!
//! # Invariants
//! - `search` is a case-insensitive full scan over title, description, tags.
//! - Statistics recompute overdue state from `due_date` and `completed`
//!   rather than trusting any previously derived value.

use crate::model::task::{Priority, Task, TaskPatch, TaskStatus};
use crate::model::validation::ValidationResult;
use crate::repo::query::{QueryOptions, Queryable, SortOrder, SortValue};
use crate::repo::{Entity, RepoResult, Repository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const TASKS_COLLECTION: &str = "tasks";

pub type TaskRepository = Repository<Task>;
pub type TaskQuery = QueryOptions<TaskFilter, TaskSortField>;

/// Equality filter over one task field.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFilter {
    UserId(String),
    AssignedTo(String),
    Status(TaskStatus),
    Priority(Priority),
    /// Compared case-insensitively.
    Category(String),
    Completed(bool),
    /// Task carries this tag (normalized before comparison).
    Tag(String),
}

/// Sortable task field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSortField {
    Title,
    Priority,
    Status,
    Category,
    DueDate,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
    EstimatedHours,
    ActualHours,
}

impl TaskSortField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::Category => "category",
            Self::DueDate => "dueDate",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::CompletedAt => "completedAt",
            Self::EstimatedHours => "estimatedHours",
            Self::ActualHours => "actualHours",
        }
    }

    /// Parses the persisted (camelCase) field name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "title" => Some(Self::Title),
            "priority" => Some(Self::Priority),
            "status" => Some(Self::Status),
            "category" => Some(Self::Category),
            "dueDate" => Some(Self::DueDate),
            "createdAt" => Some(Self::CreatedAt),
            "updatedAt" => Some(Self::UpdatedAt),
            "completedAt" => Some(Self::CompletedAt),
            "estimatedHours" => Some(Self::EstimatedHours),
            "actualHours" => Some(Self::ActualHours),
            _ => None,
        }
    }
}

impl Queryable for Task {
    type Filter = TaskFilter;
    type SortField = TaskSortField;

    fn matches_filter(&self, filter: &TaskFilter) -> bool {
        match filter {
            TaskFilter::UserId(user_id) => self.user_id() == user_id,
            TaskFilter::AssignedTo(user_id) => self.assigned_to() == user_id,
            TaskFilter::Status(status) => self.status() == *status,
            TaskFilter::Priority(priority) => self.priority() == *priority,
            TaskFilter::Category(category) => self.category() == category.trim().to_lowercase(),
            TaskFilter::Completed(completed) => self.is_completed() == *completed,
            TaskFilter::Tag(tag) => self.has_tag(tag),
        }
    }

    fn sort_value(&self, field: TaskSortField) -> SortValue<'_> {
        match field {
            TaskSortField::Title => SortValue::Text(self.title()),
            TaskSortField::Priority => SortValue::Rank(self.priority().rank()),
            TaskSortField::Status => SortValue::Text(self.status().as_str()),
            TaskSortField::Category => SortValue::Text(self.category()),
            TaskSortField::DueDate => SortValue::Timestamp(self.due_date()),
            TaskSortField::CreatedAt => SortValue::Timestamp(Some(self.created_at())),
            TaskSortField::UpdatedAt => SortValue::Timestamp(Some(self.updated_at())),
            TaskSortField::CompletedAt => SortValue::Timestamp(self.completed_at()),
            TaskSortField::EstimatedHours => SortValue::Number(self.estimated_hours()),
            TaskSortField::ActualHours => SortValue::Number(self.actual_hours()),
        }
    }
}

impl Entity for Task {
    type Patch = TaskPatch;

    const COLLECTION: &'static str = TASKS_COLLECTION;

    fn id(&self) -> &str {
        Task::id(self)
    }

    fn assign_id(&mut self, id: String) {
        Task::assign_id(self, id);
    }

    fn validate(&self) -> ValidationResult<()> {
        Task::validate(self)
    }

    fn apply_patch(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> ValidationResult<()> {
        Task::apply_patch(self, patch, now)
    }
}

/// Aggregated task counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatistics {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_category: BTreeMap<String, usize>,
    /// `completed / total * 100`, or 0 for an empty collection.
    pub completion_rate: f64,
}

impl Repository<Task> {
    pub fn find_by_user_id(&self, user_id: &str) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::UserId(user_id.to_string())))
    }

    pub fn find_by_assignee(&self, user_id: &str) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::AssignedTo(user_id.to_string())))
    }

    pub fn find_by_status(&self, status: TaskStatus) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::Status(status)))
    }

    pub fn find_by_priority(&self, priority: Priority) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::Priority(priority)))
    }

    pub fn find_by_category(&self, category: &str) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::Category(category.to_string())))
    }

    pub fn find_by_tag(&self, tag: &str) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::Tag(tag.to_string())))
    }

    pub fn find_pending(&self) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::Completed(false)))
    }

    pub fn find_completed(&self) -> RepoResult<Vec<Task>> {
        self.find_all(&TaskQuery::new().filter(TaskFilter::Completed(true)))
    }

    /// Open tasks whose due date has passed, earliest due first.
    pub fn find_overdue(&self, user_id: Option<&str>) -> RepoResult<Vec<Task>> {
        let now = self.now();
        let mut query = TaskQuery::new()
            .filter(TaskFilter::Completed(false))
            .sort(TaskSortField::DueDate, SortOrder::Asc);
        if let Some(user_id) = user_id {
            query = query.filter(TaskFilter::UserId(user_id.to_string()));
        }
        Ok(self
            .find_all(&query)?
            .into_iter()
            .filter(|task| task.is_overdue(now))
            .collect())
    }

    /// Tasks due within `[start, end]`, earliest due first.
    pub fn find_by_due_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<Task>> {
        let query = TaskQuery::new().sort(TaskSortField::DueDate, SortOrder::Asc);
        Ok(self
            .find_all(&query)?
            .into_iter()
            .filter(|task| task.due_date().is_some_and(|due| due >= start && due <= end))
            .collect())
    }

    /// Case-insensitive substring search; a blank query matches nothing.
    pub fn search(&self, query: &str, user_id: Option<&str>) -> RepoResult<Vec<Task>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut options = TaskQuery::new();
        if let Some(user_id) = user_id {
            options = options.filter(TaskFilter::UserId(user_id.to_string()));
        }
        Ok(self
            .find_all(&options)?
            .into_iter()
            .filter(|task| task.matches_text(&needle))
            .collect())
    }

    /// All distinct tags in use, sorted.
    pub fn list_tags(&self, user_id: Option<&str>) -> RepoResult<Vec<String>> {
        let mut options = TaskQuery::new();
        if let Some(user_id) = user_id {
            options = options.filter(TaskFilter::UserId(user_id.to_string()));
        }
        let mut tags: Vec<String> = self
            .find_all(&options)?
            .iter()
            .flat_map(|task| task.tags().iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    /// Single-pass aggregate over the (optionally user-scoped) collection.
    pub fn get_statistics(&self, user_id: Option<&str>) -> RepoResult<TaskStatistics> {
        let now = self.now();
        let mut options = TaskQuery::new();
        if let Some(user_id) = user_id {
            options = options.filter(TaskFilter::UserId(user_id.to_string()));
        }

        let mut stats = TaskStatistics::default();
        for priority in Priority::ALL {
            stats.by_priority.insert(priority, 0);
        }
        for task in self.find_all(&options)? {
            stats.total += 1;
            if task.is_completed() {
                stats.completed += 1;
            } else {
                stats.pending += 1;
                if task.due_date().is_some_and(|due| due < now) {
                    stats.overdue += 1;
                }
            }
            *stats.by_priority.entry(task.priority()).or_insert(0) += 1;
            *stats
                .by_category
                .entry(task.category().to_string())
                .or_insert(0) += 1;
        }
        if stats.total > 0 {
            stats.completion_rate = stats.completed as f64 / stats.total as f64 * 100.0;
        }
        Ok(stats)
    }
}
