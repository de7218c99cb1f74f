use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use taskdesk_core::controller::CreateTaskPayload;
use taskdesk_core::{
    CacheSettings, ControllerError, ControllerEvent, ErrorKind, ManualClock, MemoryStorage,
    NewTask, NewUser, PresentationSurface, Priority, Role, SequentialIdGenerator, Services, Task,
    TaskController, TaskFilterKind, TaskPatch, TaskStatistics, TaskStatus, User, ViewIntent,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Tasks { filter: String, titles: Vec<String> },
    Stats { total: usize, completed: usize, overdue: usize },
    Added(String),
    Updated(String),
    Removed(String),
    Error(String),
    Success(String),
    Info(String),
}

#[derive(Default)]
struct RecordingSurface {
    calls: RefCell<Vec<Call>>,
}

impl RecordingSurface {
    fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    fn last_tasks(&self) -> Option<(String, Vec<String>)> {
        self.calls.borrow().iter().rev().find_map(|call| match call {
            Call::Tasks { filter, titles } => Some((filter.clone(), titles.clone())),
            _ => None,
        })
    }

    fn errors(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl PresentationSurface for RecordingSurface {
    fn display_tasks(&self, tasks: &[Task], filter: &TaskFilterKind) {
        self.push(Call::Tasks {
            filter: filter.to_string(),
            titles: tasks.iter().map(|task| task.title().to_string()).collect(),
        });
    }

    fn display_stats(&self, stats: &TaskStatistics) {
        self.push(Call::Stats {
            total: stats.total,
            completed: stats.completed,
            overdue: stats.overdue,
        });
    }

    fn add_task(&self, task: &Task) {
        self.push(Call::Added(task.id().to_string()));
    }

    fn update_task(&self, task: &Task) {
        self.push(Call::Updated(task.id().to_string()));
    }

    fn remove_task(&self, task_id: &str) {
        self.push(Call::Removed(task_id.to_string()));
    }

    fn show_error(&self, message: &str) {
        self.push(Call::Error(message.to_string()));
    }

    fn show_success(&self, message: &str) {
        self.push(Call::Success(message.to_string()));
    }

    fn show_info(&self, message: &str) {
        self.push(Call::Info(message.to_string()));
    }
}

struct Fixture {
    storage: Rc<MemoryStorage>,
    clock: Rc<ManualClock>,
    surface: Rc<RecordingSurface>,
    controller: Rc<TaskController>,
    events: Rc<RefCell<Vec<ControllerEvent>>>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap()
}

fn fixture() -> Fixture {
    let storage = Rc::new(MemoryStorage::new());
    let clock = Rc::new(ManualClock::new(start()));
    let surface = Rc::new(RecordingSurface::default());
    let services = Services::new(
        storage.clone(),
        clock.clone(),
        Rc::new(SequentialIdGenerator::new("id")),
        CacheSettings::default(),
    );
    let controller = TaskController::new(services, surface.clone(), clock.clone());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    controller.subscribe(move |event: &ControllerEvent| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    });
    Fixture {
        storage,
        clock,
        surface,
        controller,
        events,
    }
}

fn register(fx: &Fixture, username: &str, role: Role) -> User {
    let mut draft = NewUser::new(username, format!("{username}@example.com"));
    draft.role = role;
    fx.controller.services().users.create_user(draft).unwrap()
}

fn payload(title: &str) -> CreateTaskPayload {
    CreateTaskPayload {
        title: title.to_string(),
        ..CreateTaskPayload::default()
    }
}

#[test]
fn sign_in_shows_tasks_and_stats() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);

    let signed_in = fx.controller.sign_in(alice.id()).unwrap();

    assert_eq!(signed_in.last_login_at(), Some(start()));
    assert_eq!(fx.controller.current_user().as_ref().map(User::id), Some(alice.id()));
    assert_eq!(
        fx.surface.take(),
        vec![
            Call::Info("Signed in as alice".to_string()),
            Call::Tasks {
                filter: "all".to_string(),
                titles: Vec::new()
            },
            Call::Stats {
                total: 0,
                completed: 0,
                overdue: 0
            },
        ]
    );
}

#[test]
fn sign_in_with_unknown_user_fails_visibly() {
    let fx = fixture();

    let err = fx.controller.sign_in("ghost").unwrap_err();

    assert!(matches!(err, ControllerError::NotFound { entity: "user", .. }));
    assert!(fx.controller.current_user().is_none());
    assert_eq!(fx.surface.errors(), vec!["user not found: ghost".to_string()]);
}

#[test]
fn operations_require_a_signed_in_user() {
    let fx = fixture();

    let err = fx.controller.create_task(payload("Nobody's")).unwrap_err();

    assert!(matches!(err, ControllerError::NotSignedIn));
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert_eq!(fx.surface.errors().len(), 1);
    let events = fx.events.borrow();
    match &events[..] {
        [ControllerEvent::Error {
            operation,
            kind,
            timestamp,
            ..
        }] => {
            assert_eq!(*operation, "createTask");
            assert_eq!(*kind, ErrorKind::Permission);
            assert_eq!(*timestamp, start());
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[test]
fn create_pushes_hint_refresh_and_stats_in_order() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    fx.surface.take();

    let task = fx.controller.create_task(payload("Buy milk")).unwrap();

    assert_eq!(task.user_id(), alice.id());
    assert_eq!(
        fx.surface.take(),
        vec![
            Call::Added(task.id().to_string()),
            Call::Success("Task created".to_string()),
            Call::Tasks {
                filter: "all".to_string(),
                titles: vec!["Buy milk".to_string()]
            },
            Call::Stats {
                total: 1,
                completed: 0,
                overdue: 0
            },
        ]
    );
    assert!(fx.events.borrow().iter().any(|event| matches!(
        event,
        ControllerEvent::TaskCreated(created) if created.id() == task.id()
    )));
}

#[test]
fn non_owner_is_denied_without_touching_storage() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    let bob = register(&fx, "bob", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    let task = fx.controller.create_task(payload("Private")).unwrap();
    fx.controller.sign_out();
    fx.controller.sign_in(bob.id()).unwrap();
    fx.events.borrow_mut().clear();
    let saves_before = fx.storage.save_calls();

    let err = fx
        .controller
        .update_task(task.id(), vec![TaskPatch::Title("Hijacked".to_string())])
        .unwrap_err();
    match &err {
        ControllerError::Permission {
            user_id,
            task_id,
            action,
        } => {
            assert_eq!(user_id, bob.id());
            assert_eq!(task_id, task.id());
            assert_eq!(*action, "update");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fx.controller.delete_task(task.id()).is_err());
    assert!(fx.controller.toggle_task_completion(task.id()).is_err());
    assert!(fx.controller.add_note(task.id(), "sneaky").is_err());

    assert_eq!(fx.storage.save_calls(), saves_before);
    let stored = fx
        .controller
        .services()
        .tasks
        .get_task(task.id())
        .unwrap()
        .unwrap();
    assert_eq!(stored.title(), "Private");
    assert!(!stored.is_completed());
    assert_eq!(fx.events.borrow().len(), 4);
    assert!(fx.events.borrow().iter().all(|event| matches!(
        event,
        ControllerEvent::Error {
            kind: ErrorKind::Permission,
            ..
        }
    )));
}

#[test]
fn assignee_and_admin_may_modify_manager_may_only_view() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    let bob = register(&fx, "bob", Role::Member);
    let root = register(&fx, "root", Role::Admin);
    let lead = register(&fx, "lead", Role::Manager);
    fx.controller.sign_in(alice.id()).unwrap();
    let task = fx.controller.create_task(payload("Shared work")).unwrap();
    fx.controller.assign_task(task.id(), bob.id()).unwrap();

    fx.controller.sign_in(bob.id()).unwrap();
    let logged = fx.controller.add_time_spent(task.id(), 2.0).unwrap();
    assert_eq!(logged.actual_hours(), Some(2.0));

    fx.controller.sign_in(root.id()).unwrap();
    let renamed = fx
        .controller
        .update_task(task.id(), vec![TaskPatch::Priority(Priority::Urgent)])
        .unwrap();
    assert!(fx.controller.can_modify_task(&renamed));

    fx.controller.sign_in(lead.id()).unwrap();
    assert!(fx.controller.can_view_task(&renamed));
    assert!(!fx.controller.can_modify_task(&renamed));
    assert!(fx.controller.get_task(task.id()).unwrap().is_some());
    let err = fx.controller.toggle_task_completion(task.id()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
}

#[test]
fn get_task_is_view_gated() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    let bob = register(&fx, "bob", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    let task = fx.controller.create_task(payload("Diary")).unwrap();

    fx.controller.sign_in(bob.id()).unwrap();
    let err = fx.controller.get_task(task.id()).unwrap_err();
    assert!(matches!(err, ControllerError::Permission { action: "view", .. }));
    assert_eq!(fx.controller.get_task("missing").unwrap(), None);
}

#[test]
fn completing_an_overdue_task_refreshes_the_active_filter() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    let late = fx
        .controller
        .create_task(CreateTaskPayload {
            title: "Pay invoice".to_string(),
            due_date: Some(start() - Duration::days(1)),
            ..CreateTaskPayload::default()
        })
        .unwrap();
    fx.controller
        .create_task(CreateTaskPayload {
            title: "Future".to_string(),
            due_date: Some(start() + Duration::days(3)),
            ..CreateTaskPayload::default()
        })
        .unwrap();

    let overdue = fx.controller.filter_tasks(TaskFilterKind::Overdue).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(
        fx.surface.last_tasks(),
        Some(("overdue".to_string(), vec!["Pay invoice".to_string()]))
    );
    fx.surface.take();

    fx.clock.advance(Duration::minutes(1));
    let done = fx.controller.toggle_task_completion(late.id()).unwrap();

    assert!(done.is_completed());
    assert_eq!(
        fx.surface.take(),
        vec![
            Call::Updated(late.id().to_string()),
            Call::Success("Task completed".to_string()),
            Call::Tasks {
                filter: "overdue".to_string(),
                titles: Vec::new()
            },
            Call::Stats {
                total: 2,
                completed: 1,
                overdue: 0
            },
        ]
    );
}

#[test]
fn filter_changes_are_remembered_and_announced() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    let mut urgent = payload("Fire drill");
    urgent.priority = Some(Priority::Urgent);
    fx.controller.create_task(urgent).unwrap();
    fx.controller.create_task(payload("Stretch")).unwrap();
    fx.events.borrow_mut().clear();

    let kind = TaskFilterKind::Priority(Priority::Urgent);
    let shown = fx.controller.filter_tasks(kind.clone()).unwrap();
    fx.controller.filter_tasks(kind.clone()).unwrap();

    assert_eq!(shown.len(), 1);
    assert_eq!(fx.controller.current_filter(), kind);
    let changes = fx
        .events
        .borrow()
        .iter()
        .filter(|event| matches!(event, ControllerEvent::FilterChanged(_)))
        .count();
    assert_eq!(changes, 1);
    assert_eq!(
        fx.surface.last_tasks(),
        Some(("priority:urgent".to_string(), vec!["Fire drill".to_string()]))
    );
}

#[test]
fn blank_search_reapplies_current_filter() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    fx.controller.create_task(payload("Buy milk")).unwrap();
    let done = fx.controller.create_task(payload("Buy bread")).unwrap();
    fx.controller.toggle_task_completion(done.id()).unwrap();
    fx.controller.filter_tasks(TaskFilterKind::Pending).unwrap();

    let hits = fx.controller.search_tasks("BREAD").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        fx.surface.last_tasks(),
        Some(("search".to_string(), vec!["Buy bread".to_string()]))
    );
    assert_eq!(fx.controller.current_filter(), TaskFilterKind::Pending);

    let reset = fx.controller.search_tasks("   ").unwrap();
    assert_eq!(reset.len(), 1);
    assert_eq!(
        fx.surface.last_tasks(),
        Some(("pending".to_string(), vec!["Buy milk".to_string()]))
    );

    fx.surface.take();
    assert!(fx.controller.search_tasks("nothing here").unwrap().is_empty());
    assert!(fx
        .surface
        .take()
        .contains(&Call::Info("No tasks match your search".to_string())));
}

#[test]
fn raw_intents_route_through_one_table() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();

    fx.controller
        .dispatch_raw(
            "createTaskRequested",
            json!({"title": "From the form", "priority": "high", "tags": ["Work"]}),
        )
        .unwrap();
    let created = fx
        .controller
        .services()
        .tasks
        .get_tasks_for_user(alice.id(), Default::default())
        .unwrap();
    assert_eq!(created.len(), 1);
    let task_id = created[0].id().to_string();
    assert_eq!(created[0].priority(), Priority::High);
    assert!(created[0].has_tag("work"));

    fx.controller
        .dispatch_raw(
            "updateTaskRequested",
            json!({"taskId": task_id, "updates": {"title": "Renamed", "dueDate": null}}),
        )
        .unwrap();
    fx.controller
        .dispatch_raw("addNoteRequested", json!({"taskId": task_id, "content": "ping"}))
        .unwrap();
    fx.controller
        .dispatch_raw("filterRequested", json!({"filter": "completed"}))
        .unwrap();
    assert_eq!(fx.controller.current_filter(), TaskFilterKind::Completed);

    let task = fx.controller.get_task(&task_id).unwrap().unwrap();
    assert_eq!(task.title(), "Renamed");
    assert_eq!(task.notes().len(), 1);

    fx.surface.take();
    fx.controller.dispatch_raw("dragStarted", json!({"x": 1})).unwrap();
    assert!(fx.surface.take().is_empty());

    let err = fx
        .controller
        .dispatch_raw("addTimeRequested", json!({"taskId": task_id}))
        .unwrap_err();
    assert!(matches!(err, ControllerError::InvalidRequest(_)));
    assert_eq!(fx.surface.errors().len(), 1);

    fx.controller
        .dispatch_raw("deleteTaskRequested", json!({"taskId": task_id}))
        .unwrap();
    assert!(fx.surface.take().contains(&Call::Removed(task_id.clone())));
    assert!(fx.controller.get_task(&task_id).unwrap().is_none());
}

#[test]
fn request_shape_is_checked_before_authorization() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    let task = fx.controller.create_task(payload("Track me")).unwrap();
    let saves_before = fx.storage.save_calls();

    let negative = fx.controller.add_time_spent(task.id(), -1.0).unwrap_err();
    assert!(matches!(negative, ControllerError::InvalidRequest(_)));
    let blank_note = fx.controller.add_note(task.id(), "  ").unwrap_err();
    assert!(matches!(blank_note, ControllerError::InvalidRequest(_)));
    let empty_update = fx
        .controller
        .dispatch(ViewIntent::UpdateTask {
            task_id: task.id().to_string(),
            updates: Default::default(),
        })
        .unwrap_err();
    assert_eq!(empty_update.kind(), ErrorKind::InvalidRequest);

    assert_eq!(fx.storage.save_calls(), saves_before);
}

#[test]
fn missing_task_mutations_are_not_found() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();

    let err = fx.controller.delete_task("nope").unwrap_err();

    assert!(matches!(err, ControllerError::NotFound { entity: "task", .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn service_validation_errors_surface_through_the_controller() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();

    let err = fx.controller.create_task(payload("   ")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(fx.surface.errors().len(), 1);
}

#[test]
fn sign_out_clears_the_view() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    fx.controller.create_task(payload("Hidden after sign out")).unwrap();
    fx.controller.filter_tasks(TaskFilterKind::Pending).unwrap();

    fx.controller.sign_out();

    assert!(fx.controller.current_user().is_none());
    assert_eq!(fx.controller.current_filter(), TaskFilterKind::All);
    assert_eq!(fx.surface.last_tasks(), Some(("all".to_string(), Vec::new())));
    let err = fx.controller.dispatch(ViewIntent::Refresh).unwrap_err();
    assert!(matches!(err, ControllerError::NotSignedIn));
}

#[test]
fn full_form_update_keeps_the_requested_status() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    let task = fx.controller.create_task(payload("Waiting on vendor")).unwrap();

    fx.controller
        .dispatch_raw(
            "updateTaskRequested",
            json!({
                "taskId": task.id(),
                "updates": {
                    "title": "Waiting on vendor",
                    "status": "blocked",
                    "completed": false
                }
            }),
        )
        .unwrap();

    let stored = fx.controller.get_task(task.id()).unwrap().unwrap();
    assert_eq!(stored.status(), TaskStatus::Blocked);
    assert!(!stored.is_completed());
    assert_eq!(stored.completed_at(), None);
}

#[test]
fn service_writes_outside_the_controller_refresh_the_view() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);
    fx.controller.sign_in(alice.id()).unwrap();
    fx.controller.filter_tasks(TaskFilterKind::Pending).unwrap();
    fx.surface.take();
    let tasks = &fx.controller.services().tasks;

    let task = tasks
        .create_task(NewTask::new(alice.id(), "Imported"))
        .unwrap();
    assert_eq!(
        fx.surface.take(),
        vec![Call::Tasks {
            filter: "pending".to_string(),
            titles: vec!["Imported".to_string()]
        }]
    );

    tasks.toggle_task_completion(task.id()).unwrap();
    assert_eq!(
        fx.surface.take(),
        vec![Call::Tasks {
            filter: "pending".to_string(),
            titles: Vec::new()
        }]
    );

    assert!(tasks.delete_task(task.id()).unwrap());
    assert_eq!(fx.surface.take().len(), 1);
    assert_eq!(fx.controller.current_filter(), TaskFilterKind::Pending);
}

#[test]
fn service_writes_while_signed_out_are_not_displayed() {
    let fx = fixture();
    let alice = register(&fx, "alice", Role::Member);

    fx.controller
        .services()
        .tasks
        .create_task(NewTask::new(alice.id(), "Background import"))
        .unwrap();

    assert!(fx.surface.take().is_empty());
    assert!(fx.events.borrow().is_empty());
}
