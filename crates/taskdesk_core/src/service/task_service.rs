//! Task use-case service.
//!
//! # Responsibility
//! - Check cross-entity references (owner, assignee, dependencies) before
//!   writes reach the repository.
//! - Emit `taskCreated`/`taskUpdated`/`taskDeleted` after successful writes.
//! - Expose user-scoped read projections over the task query surface.
//!
//! # Invariants
//! - A task is never created for a user that does not exist.
//! - Read operations never emit change events.

use crate::clock::Clock;
use crate::events::{EventBus, ListenerResult, ServiceEvent, SubscriptionId};
use crate::id_gen::IdGenerator;
use crate::model::task::{NewTask, Priority, Task, TaskNote, TaskPatch};
use crate::repo::query::SortOrder;
use crate::repo::task_repo::{TaskFilter, TaskQuery, TaskRepository, TaskSortField, TaskStatistics};
use crate::repo::user_repo::UserRepository;
use crate::service::{ServiceError, ServiceResult};
use log::{info, warn};
use std::rc::Rc;

/// Task orchestration over task and user repositories.
pub struct TaskService {
    tasks: TaskRepository,
    users: Rc<UserRepository>,
    ids: Rc<dyn IdGenerator>,
    clock: Rc<dyn Clock>,
    events: EventBus<ServiceEvent>,
}

impl TaskService {
    pub fn new(
        tasks: TaskRepository,
        users: Rc<UserRepository>,
        ids: Rc<dyn IdGenerator>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            tasks,
            users,
            ids,
            clock,
            events: EventBus::new("task_service"),
        }
    }

    /// Underlying repository, for callers that need raw query access.
    pub fn repository(&self) -> &TaskRepository {
        &self.tasks
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ServiceEvent) -> ListenerResult + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Creates a task for an existing owner.
    ///
    /// # Errors
    /// - `ServiceError::Reference` when the owner, assignee or a dependency
    ///   does not exist.
    /// - `ServiceError::Validation` for an invalid draft.
    /// - Repository errors (e.g. duplicate explicit id) unchanged.
    pub fn create_task(&self, draft: NewTask) -> ServiceResult<Task> {
        self.guard("createTask", || {
            self.require_user(&draft.user_id)?;
            if let Some(assignee) = draft.assigned_to.as_deref() {
                self.require_user(assignee)?;
            }
            for dependency in &draft.dependencies {
                self.require_task(dependency)?;
            }

            let task = Task::create(draft, self.clock.now())?;
            let created = self.tasks.create(task)?;
            info!(
                "event=task_created module=service status=ok task_id={} user_id={}",
                created.id(),
                created.user_id()
            );
            self.events.emit(&ServiceEvent::TaskCreated(created.clone()));
            Ok(created)
        })
    }

    /// Applies patches in order; `Ok(None)` when the task does not exist.
    pub fn update_task(
        &self,
        task_id: &str,
        patches: Vec<TaskPatch>,
    ) -> ServiceResult<Option<Task>> {
        self.guard("updateTask", || {
            for patch in &patches {
                match patch {
                    TaskPatch::AssignedTo(user_id) => self.require_user(user_id)?,
                    TaskPatch::AddDependency(dependency) if dependency != task_id => {
                        self.require_task(dependency)?
                    }
                    _ => {}
                }
            }

            let updated = self.tasks.update(task_id, patches)?;
            if let Some(task) = updated.as_ref() {
                self.events.emit(&ServiceEvent::TaskUpdated(task.clone()));
            }
            Ok(updated)
        })
    }

    /// Deletes a task; `Ok(false)` when it does not exist.
    pub fn delete_task(&self, task_id: &str) -> ServiceResult<bool> {
        self.guard("deleteTask", || {
            let deleted = self.tasks.delete(task_id)?;
            if deleted {
                info!("event=task_deleted module=service status=ok task_id={task_id}");
                self.events.emit(&ServiceEvent::TaskDeleted {
                    task_id: task_id.to_string(),
                });
            }
            Ok(deleted)
        })
    }

    pub fn toggle_task_completion(&self, task_id: &str) -> ServiceResult<Option<Task>> {
        let Some(task) = self.get_task(task_id)? else {
            return Ok(None);
        };
        self.update_task(task_id, vec![TaskPatch::Completed(!task.is_completed())])
    }

    pub fn assign_task(&self, task_id: &str, user_id: &str) -> ServiceResult<Option<Task>> {
        self.update_task(task_id, vec![TaskPatch::AssignedTo(user_id.to_string())])
    }

    pub fn add_time_spent(&self, task_id: &str, hours: f64) -> ServiceResult<Option<Task>> {
        self.update_task(task_id, vec![TaskPatch::AddTimeSpent(hours)])
    }

    /// Appends a note authored by `author`.
    pub fn add_note(
        &self,
        task_id: &str,
        content: &str,
        author: &str,
    ) -> ServiceResult<Option<Task>> {
        let note = TaskNote {
            id: self.ids.next_id(),
            content: content.trim().to_string(),
            author: author.to_string(),
            created_at: self.clock.now(),
        };
        self.update_task(task_id, vec![TaskPatch::AddNote(note)])
    }

    pub fn get_task(&self, task_id: &str) -> ServiceResult<Option<Task>> {
        self.guard("getTask", || Ok(self.tasks.find_by_id(task_id)?))
    }

    /// Tasks owned by `user_id`, with extra query options applied on top.
    pub fn get_tasks_for_user(
        &self,
        user_id: &str,
        options: TaskQuery,
    ) -> ServiceResult<Vec<Task>> {
        self.guard("getTasksForUser", || {
            Ok(self
                .tasks
                .find_all(&options.filter(TaskFilter::UserId(user_id.to_string())))?)
        })
    }

    /// Open tasks, most urgent first.
    pub fn get_pending_tasks(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        self.get_tasks_for_user(
            user_id,
            TaskQuery::new()
                .filter(TaskFilter::Completed(false))
                .sort(TaskSortField::Priority, SortOrder::Desc),
        )
    }

    /// Completed tasks, most recently completed first.
    pub fn get_completed_tasks(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        self.get_tasks_for_user(
            user_id,
            TaskQuery::new()
                .filter(TaskFilter::Completed(true))
                .sort(TaskSortField::CompletedAt, SortOrder::Desc),
        )
    }

    pub fn get_overdue_tasks(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        self.guard("getOverdueTasks", || Ok(self.tasks.find_overdue(Some(user_id))?))
    }

    pub fn get_tasks_by_priority(
        &self,
        user_id: &str,
        priority: Priority,
    ) -> ServiceResult<Vec<Task>> {
        self.get_tasks_for_user(
            user_id,
            TaskQuery::new()
                .filter(TaskFilter::Priority(priority))
                .sort(TaskSortField::CreatedAt, SortOrder::Desc),
        )
    }

    pub fn get_tasks_by_category(&self, user_id: &str, category: &str) -> ServiceResult<Vec<Task>> {
        self.get_tasks_for_user(
            user_id,
            TaskQuery::new()
                .filter(TaskFilter::Category(category.to_string()))
                .sort(TaskSortField::CreatedAt, SortOrder::Desc),
        )
    }

    /// Tasks assigned to `user_id`, regardless of owner.
    pub fn get_tasks_assigned_to_user(&self, user_id: &str) -> ServiceResult<Vec<Task>> {
        self.guard("getTasksAssignedToUser", || {
            Ok(self.tasks.find_by_assignee(user_id)?)
        })
    }

    pub fn search_tasks(&self, user_id: &str, query: &str) -> ServiceResult<Vec<Task>> {
        self.guard("searchTasks", || Ok(self.tasks.search(query, Some(user_id))?))
    }

    pub fn get_task_stats(&self, user_id: &str) -> ServiceResult<TaskStatistics> {
        self.guard("getTaskStats", || Ok(self.tasks.get_statistics(Some(user_id))?))
    }

    pub fn list_tags(&self, user_id: &str) -> ServiceResult<Vec<String>> {
        self.guard("listTags", || Ok(self.tasks.list_tags(Some(user_id))?))
    }

    fn require_user(&self, user_id: &str) -> ServiceResult<()> {
        if self.users.exists(user_id)? {
            Ok(())
        } else {
            Err(ServiceError::Reference {
                entity: "user",
                id: user_id.to_string(),
            })
        }
    }

    fn require_task(&self, task_id: &str) -> ServiceResult<()> {
        if self.tasks.exists(task_id)? {
            Ok(())
        } else {
            Err(ServiceError::Reference {
                entity: "task",
                id: task_id.to_string(),
            })
        }
    }

    // Repository failures were already logged where they happened; only
    // service-originated failures are logged here. All are emitted.
    fn guard<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce() -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        body().map_err(|err| {
            if !matches!(err, ServiceError::Repo(_)) {
                warn!(
                    "event=task_service_failed module=service status=error \
                     operation={operation} error_kind={} error={err}",
                    err.kind()
                );
            }
            self.events.emit(&ServiceEvent::Error {
                operation,
                kind: err.kind(),
                error: err.to_string(),
            });
            err
        })
    }
}
