//! Task controller.
//!
//! # Responsibility
//! - Hold the signed-in user and the active list filter.
//! - Authorize every task mutation before the service is reached.
//! - Keep the presentation surface in sync after writes.
//!
//! # Invariants
//! - Every service task event re-applies the active filter. Events raised
//!   while a controller mutation runs are deferred until it finishes, so the
//!   incremental hint is shown before the full refresh.
//! - Statistics are recomputed and pushed after every successful mutation.

use crate::clock::Clock;
use crate::controller::intent::{CreateTaskPayload, ViewIntent};
use crate::controller::presentation::PresentationSurface;
use crate::controller::{ControllerError, ControllerResult, TaskFilterKind};
use crate::events::{ControllerEvent, EventBus, ListenerResult, ServiceEvent, SubscriptionId};
use crate::model::task::{Task, TaskPatch};
use crate::model::user::{Permission, User};
use crate::repo::query::SortOrder;
use crate::repo::task_repo::{TaskQuery, TaskSortField, TaskStatistics};
use crate::service::Services;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// True when `user` owns the task, is its assignee, or may manage all tasks.
pub fn can_modify(user: &User, task: &Task) -> bool {
    task.user_id() == user.id()
        || task.assigned_to() == user.id()
        || user.has_permission(Permission::ManageAllTasks)
}

/// Modification rights, widened to roles that manage users.
pub fn can_view(user: &User, task: &Task) -> bool {
    can_modify(user, task) || user.has_permission(Permission::ManageUsers)
}

/// Signed-in user and the active list filter.
#[derive(Debug, Default)]
struct Session {
    user: Option<User>,
    filter: TaskFilterKind,
}

/// Routes presentation intents to the task service for one signed-in user.
pub struct TaskController {
    services: Services,
    presentation: Rc<dyn PresentationSurface>,
    clock: Rc<dyn Clock>,
    session: RefCell<Session>,
    events: EventBus<ControllerEvent>,
    mutating: Cell<bool>,
    deferred_events: Cell<usize>,
}

impl TaskController {
    /// Builds the controller and subscribes it to task changes on
    /// `services.tasks`, including changes made without going through it.
    pub fn new(
        services: Services,
        presentation: Rc<dyn PresentationSurface>,
        clock: Rc<dyn Clock>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let this = Weak::clone(this);
            services.tasks.subscribe(move |event: &ServiceEvent| {
                if let Some(controller) = this.upgrade() {
                    controller.on_service_event(event);
                }
                Ok(())
            });

            Self {
                services,
                presentation,
                clock,
                session: RefCell::new(Session::default()),
                events: EventBus::new("task_controller"),
                mutating: Cell::new(false),
                deferred_events: Cell::new(0),
            }
        })
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.borrow().user.clone()
    }

    pub fn current_filter(&self) -> TaskFilterKind {
        self.session.borrow().filter.clone()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ControllerEvent) -> ListenerResult + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Signs in an existing user without credentials and loads their tasks.
    ///
    /// # Errors
    /// - `NotFound` when the user does not exist.
    pub fn sign_in(&self, user_id: &str) -> ControllerResult<User> {
        let user = self.report("signIn", self.try_sign_in(user_id))?;
        info!(
            "event=user_signed_in module=controller status=ok user_id={}",
            user.id()
        );
        *self.session.borrow_mut() = Session {
            user: Some(user.clone()),
            filter: TaskFilterKind::All,
        };
        self.presentation
            .show_info(&format!("Signed in as {}", user.display_name()));
        self.load_tasks()?;
        self.refresh_stats()?;
        Ok(user)
    }

    pub fn sign_out(&self) {
        let previous = std::mem::take(&mut *self.session.borrow_mut());
        if let Some(user) = previous.user {
            info!(
                "event=user_signed_out module=controller status=ok user_id={}",
                user.id()
            );
        }
        self.deferred_events.set(0);
        self.presentation.display_tasks(&[], &TaskFilterKind::All);
        self.presentation.show_info("Signed out");
    }

    pub fn can_modify_task(&self, task: &Task) -> bool {
        self.session
            .borrow()
            .user
            .as_ref()
            .is_some_and(|user| can_modify(user, task))
    }

    pub fn can_view_task(&self, task: &Task) -> bool {
        self.session
            .borrow()
            .user
            .as_ref()
            .is_some_and(|user| can_view(user, task))
    }

    /// View-gated lookup; `Ok(None)` when the task does not exist.
    pub fn get_task(&self, task_id: &str) -> ControllerResult<Option<Task>> {
        self.report("getTask", self.try_get_task(task_id))
    }

    pub fn create_task(&self, payload: CreateTaskPayload) -> ControllerResult<Task> {
        self.run_mutation("createTask", |this| {
            let user = this.require_user()?;
            let draft = payload.into_draft(user.id());
            let task = this.services.tasks.create_task(draft)?;
            this.presentation.add_task(&task);
            this.presentation.show_success("Task created");
            this.events.emit(&ControllerEvent::TaskCreated(task.clone()));
            Ok(task)
        })
    }

    /// Applies patches to a task the signed-in user may modify.
    pub fn update_task(&self, task_id: &str, patches: Vec<TaskPatch>) -> ControllerResult<Task> {
        self.run_mutation("updateTask", |this| {
            this.authorize(task_id, "update")?;
            let updated = this.services.tasks.update_task(task_id, patches)?;
            let task = updated.ok_or_else(|| task_not_found(task_id))?;
            this.announce_update(&task, "Task updated");
            Ok(task)
        })
    }

    pub fn delete_task(&self, task_id: &str) -> ControllerResult<()> {
        self.run_mutation("deleteTask", |this| {
            this.authorize(task_id, "delete")?;
            if !this.services.tasks.delete_task(task_id)? {
                return Err(task_not_found(task_id));
            }
            this.presentation.remove_task(task_id);
            this.presentation.show_success("Task deleted");
            this.events.emit(&ControllerEvent::TaskDeleted {
                task_id: task_id.to_string(),
            });
            Ok(())
        })
    }

    pub fn toggle_task_completion(&self, task_id: &str) -> ControllerResult<Task> {
        self.run_mutation("toggleTaskCompletion", |this| {
            this.authorize(task_id, "update")?;
            let updated = this.services.tasks.toggle_task_completion(task_id)?;
            let task = updated.ok_or_else(|| task_not_found(task_id))?;
            let message = if task.is_completed() {
                "Task completed"
            } else {
                "Task reopened"
            };
            this.announce_update(&task, message);
            Ok(task)
        })
    }

    pub fn assign_task(&self, task_id: &str, assignee_id: &str) -> ControllerResult<Task> {
        self.run_mutation("assignTask", |this| {
            this.authorize(task_id, "assign")?;
            let updated = this.services.tasks.assign_task(task_id, assignee_id)?;
            let task = updated.ok_or_else(|| task_not_found(task_id))?;
            this.announce_update(&task, "Task assigned");
            Ok(task)
        })
    }

    /// Logs `hours` of work against a task.
    ///
    /// # Errors
    /// - `InvalidRequest` unless `hours` is finite and positive.
    pub fn add_time_spent(&self, task_id: &str, hours: f64) -> ControllerResult<Task> {
        self.run_mutation("addTimeSpent", |this| {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(ControllerError::InvalidRequest(format!(
                    "hours must be a positive number, got {hours}"
                )));
            }
            this.authorize(task_id, "update")?;
            let updated = this.services.tasks.add_time_spent(task_id, hours)?;
            let task = updated.ok_or_else(|| task_not_found(task_id))?;
            this.announce_update(&task, "Time logged");
            Ok(task)
        })
    }

    pub fn add_note(&self, task_id: &str, content: &str) -> ControllerResult<Task> {
        self.run_mutation("addNote", |this| {
            if content.trim().is_empty() {
                return Err(ControllerError::InvalidRequest(
                    "note content must not be empty".to_string(),
                ));
            }
            this.authorize(task_id, "update")?;
            let author = this.require_user()?;
            let updated = this
                .services
                .tasks
                .add_note(task_id, content, author.id())?;
            let task = updated.ok_or_else(|| task_not_found(task_id))?;
            this.announce_update(&task, "Note added");
            Ok(task)
        })
    }

    /// Switches the active filter and displays its tasks.
    pub fn filter_tasks(&self, kind: TaskFilterKind) -> ControllerResult<Vec<Task>> {
        if let TaskFilterKind::Search(query) = &kind {
            return self.search_tasks(query);
        }
        let tasks = self.report("filterTasks", self.tasks_for(&kind))?;
        let changed = {
            let mut session = self.session.borrow_mut();
            let changed = session.filter != kind;
            session.filter = kind.clone();
            changed
        };
        if changed {
            debug!(
                "event=filter_changed module=controller status=ok filter={}",
                kind.name()
            );
            self.events.emit(&ControllerEvent::FilterChanged(kind.clone()));
        }
        self.presentation.display_tasks(&tasks, &kind);
        Ok(tasks)
    }

    /// Re-applies the active filter.
    pub fn load_tasks(&self) -> ControllerResult<Vec<Task>> {
        let filter = self.current_filter();
        let tasks = self.report("loadTasks", self.tasks_for(&filter))?;
        self.presentation.display_tasks(&tasks, &filter);
        Ok(tasks)
    }

    /// Displays matches for `query`; a blank query re-applies the active filter.
    pub fn search_tasks(&self, query: &str) -> ControllerResult<Vec<Task>> {
        let query = query.trim();
        if query.is_empty() {
            return self.load_tasks();
        }
        let kind = TaskFilterKind::Search(query.to_string());
        let tasks = self.report("searchTasks", self.tasks_for(&kind))?;
        self.presentation.display_tasks(&tasks, &kind);
        if tasks.is_empty() {
            self.presentation.show_info("No tasks match your search");
        }
        Ok(tasks)
    }

    pub fn refresh_stats(&self) -> ControllerResult<TaskStatistics> {
        let stats = self.report("refreshStats", self.try_stats())?;
        self.presentation.display_stats(&stats);
        self.events.emit(&ControllerEvent::StatsUpdated(stats.clone()));
        Ok(stats)
    }

    /// Reports a failure: logs it, emits `ControllerEvent::Error`, shows it on
    /// the surface and hands it back for the caller to return.
    pub fn handle_error(&self, err: ControllerError, operation: &'static str) -> ControllerError {
        let kind = err.kind();
        error!(
            "event=controller_failed module=controller status=error operation={operation} \
             error_kind={kind} error={err}"
        );
        let message = err.to_string();
        self.events.emit(&ControllerEvent::Error {
            operation,
            kind,
            message: message.clone(),
            timestamp: self.clock.now(),
        });
        self.presentation.show_error(&message);
        err
    }

    /// Routes one typed intent.
    pub fn dispatch(&self, intent: ViewIntent) -> ControllerResult<()> {
        debug!(
            "event=intent_dispatch module=controller status=start intent={}",
            intent.name()
        );
        match intent {
            ViewIntent::CreateTask(payload) => self.create_task(payload).map(drop),
            ViewIntent::UpdateTask { task_id, updates } => {
                let patches = updates.into_patches();
                if patches.is_empty() {
                    let err = ControllerError::InvalidRequest("no fields to update".to_string());
                    return Err(self.handle_error(err, "updateTask"));
                }
                self.update_task(&task_id, patches).map(drop)
            }
            ViewIntent::DeleteTask { task_id } => self.delete_task(&task_id),
            ViewIntent::ToggleCompletion { task_id } => {
                self.toggle_task_completion(&task_id).map(drop)
            }
            ViewIntent::Filter(kind) => self.filter_tasks(kind).map(drop),
            ViewIntent::Search { query } => self.search_tasks(&query).map(drop),
            ViewIntent::AddTime { task_id, hours } => {
                self.add_time_spent(&task_id, hours).map(drop)
            }
            ViewIntent::AssignTask { task_id, user_id } => {
                self.assign_task(&task_id, &user_id).map(drop)
            }
            ViewIntent::AddNote { task_id, content } => {
                self.add_note(&task_id, &content).map(drop)
            }
            ViewIntent::Refresh => {
                self.load_tasks()?;
                self.refresh_stats().map(drop)
            }
        }
    }

    /// Parses and routes a raw `(kind, payload)` event; unknown kinds are
    /// ignored.
    pub fn dispatch_raw(&self, kind: &str, payload: Value) -> ControllerResult<()> {
        match ViewIntent::parse(kind, payload) {
            Ok(Some(intent)) => self.dispatch(intent),
            Ok(None) => {
                debug!("event=intent_ignored module=controller status=skipped kind={kind}");
                Ok(())
            }
            Err(err) => {
                let err =
                    ControllerError::InvalidRequest(format!("malformed {kind} payload: {err}"));
                Err(self.handle_error(err, "dispatch"))
            }
        }
    }

    fn try_sign_in(&self, user_id: &str) -> ControllerResult<User> {
        self.services
            .users
            .record_login(user_id)?
            .ok_or_else(|| ControllerError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })
    }

    fn try_get_task(&self, task_id: &str) -> ControllerResult<Option<Task>> {
        let user = self.require_user()?;
        let Some(task) = self.services.tasks.get_task(task_id)? else {
            return Ok(None);
        };
        if !can_view(&user, &task) {
            return Err(permission_denied(&user, task_id, "view"));
        }
        Ok(Some(task))
    }

    fn try_stats(&self) -> ControllerResult<TaskStatistics> {
        let user = self.require_user()?;
        Ok(self.services.tasks.get_task_stats(user.id())?)
    }

    fn tasks_for(&self, kind: &TaskFilterKind) -> ControllerResult<Vec<Task>> {
        let user = self.require_user()?;
        let user_id = user.id();
        let tasks = &self.services.tasks;
        let found = match kind {
            TaskFilterKind::All => tasks.get_tasks_for_user(
                user_id,
                TaskQuery::new().sort(TaskSortField::CreatedAt, SortOrder::Desc),
            )?,
            TaskFilterKind::Pending => tasks.get_pending_tasks(user_id)?,
            TaskFilterKind::Completed => tasks.get_completed_tasks(user_id)?,
            TaskFilterKind::Overdue => tasks.get_overdue_tasks(user_id)?,
            TaskFilterKind::Priority(priority) => {
                tasks.get_tasks_by_priority(user_id, *priority)?
            }
            TaskFilterKind::Category(category) => {
                tasks.get_tasks_by_category(user_id, category)?
            }
            TaskFilterKind::Assigned => tasks.get_tasks_assigned_to_user(user_id)?,
            TaskFilterKind::Search(query) => tasks.search_tasks(user_id, query)?,
        };
        Ok(found)
    }

    fn require_user(&self) -> ControllerResult<User> {
        self.current_user().ok_or(ControllerError::NotSignedIn)
    }

    fn authorize(&self, task_id: &str, action: &'static str) -> ControllerResult<Task> {
        let user = self.require_user()?;
        let task = self
            .services
            .tasks
            .get_task(task_id)?
            .ok_or_else(|| task_not_found(task_id))?;
        if !can_modify(&user, &task) {
            warn!(
                "event=permission_denied module=controller status=error user_id={} \
                 task_id={task_id} action={action}",
                user.id()
            );
            return Err(permission_denied(&user, task_id, action));
        }
        Ok(task)
    }

    fn announce_update(&self, task: &Task, message: &str) {
        self.presentation.update_task(task);
        self.presentation.show_success(message);
        self.events.emit(&ControllerEvent::TaskUpdated(task.clone()));
    }

    fn run_mutation<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&Self) -> ControllerResult<T>,
    ) -> ControllerResult<T> {
        self.mutating.set(true);
        let outcome = body(self);
        self.mutating.set(false);
        let deferred = self.deferred_events.replace(0);
        if deferred > 0 {
            self.refresh_task_list(deferred);
        }
        match outcome {
            Ok(value) => {
                // Already reported through handle_error; the write itself stands.
                let _ = self.refresh_stats();
                Ok(value)
            }
            Err(err) => Err(self.handle_error(err, operation)),
        }
    }

    fn on_service_event(&self, event: &ServiceEvent) {
        if !event.changes_tasks() {
            return;
        }
        if self.mutating.get() {
            self.deferred_events.set(self.deferred_events.get() + 1);
            return;
        }
        if self.session.borrow().user.is_none() {
            return;
        }
        self.refresh_task_list(1);
    }

    fn refresh_task_list(&self, events: usize) {
        debug!("event=task_list_refresh module=controller status=start events={events}");
        // Failures are reported through handle_error.
        let _ = self.load_tasks();
    }

    fn report<T>(
        &self,
        operation: &'static str,
        result: ControllerResult<T>,
    ) -> ControllerResult<T> {
        result.map_err(|err| self.handle_error(err, operation))
    }
}

fn task_not_found(task_id: &str) -> ControllerError {
    ControllerError::NotFound {
        entity: "task",
        id: task_id.to_string(),
    }
}

fn permission_denied(user: &User, task_id: &str, action: &'static str) -> ControllerError {
    ControllerError::Permission {
        user_id: user.id().to_string(),
        task_id: task_id.to_string(),
        action,
    }
}
