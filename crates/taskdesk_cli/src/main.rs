//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run a short scripted session against the configured storage.
//! - Print every call the controller makes on its presentation surface.
//!
//! Usage: `taskdesk_cli [config.json]`

use chrono::{Duration, Utc};
use log::info;
use std::error::Error;
use std::rc::Rc;
use taskdesk_core::controller::CreateTaskPayload;
use taskdesk_core::{
    Clock, CoreConfig, NewUser, PresentationSurface, Priority, Services, SystemClock, Task,
    TaskController, TaskFilterKind, TaskStatistics, UuidIdGenerator, ViewIntent,
};

const DEMO_USERNAME: &str = "demo";

struct ConsoleSurface;

impl PresentationSurface for ConsoleSurface {
    fn display_tasks(&self, tasks: &[Task], filter: &TaskFilterKind) {
        println!("[{filter}] {} task(s)", tasks.len());
        for task in tasks {
            let mark = if task.is_completed() { "x" } else { " " };
            println!(
                "  [{mark}] {} ({}, {})",
                task.title(),
                task.priority(),
                task.category()
            );
        }
    }

    fn display_stats(&self, stats: &TaskStatistics) {
        println!(
            "stats total={} completed={} pending={} overdue={} rate={:.0}%",
            stats.total, stats.completed, stats.pending, stats.overdue, stats.completion_rate
        );
    }

    fn add_task(&self, task: &Task) {
        println!("+ {}", task.id());
    }

    fn update_task(&self, task: &Task) {
        println!("~ {}", task.id());
    }

    fn remove_task(&self, task_id: &str) {
        println!("- {task_id}");
    }

    fn show_error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn show_success(&self, message: &str) {
        println!("ok: {message}");
    }

    fn show_info(&self, message: &str) {
        println!("info: {message}");
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("taskdesk: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    config.init_logging()?;
    println!("taskdesk {}", env!("CARGO_PKG_VERSION"));

    let clock: Rc<dyn Clock> = Rc::new(SystemClock);
    let services = Services::new(
        config.open_storage()?,
        clock.clone(),
        Rc::new(UuidIdGenerator),
        config.cache_settings(),
    );
    let user = match services.users.find_by_username(DEMO_USERNAME)? {
        Some(user) => user,
        None => services
            .users
            .create_user(NewUser::new(DEMO_USERNAME, "demo@example.com"))?,
    };
    info!("event=cli_session module=cli status=start user_id={}", user.id());

    let controller = TaskController::new(services, Rc::new(ConsoleSurface), clock);
    controller.sign_in(user.id())?;

    let overdue = controller.create_task(CreateTaskPayload {
        title: "File quarterly report".to_string(),
        priority: Some(Priority::High),
        category: Some("work".to_string()),
        due_date: Some(Utc::now() - Duration::days(1)),
        ..CreateTaskPayload::default()
    })?;
    controller.dispatch(ViewIntent::CreateTask(CreateTaskPayload {
        title: "Water the plants".to_string(),
        tags: vec!["home".to_string()],
        ..CreateTaskPayload::default()
    }))?;

    controller.dispatch(ViewIntent::Filter(TaskFilterKind::Overdue))?;
    controller.add_time_spent(overdue.id(), 1.5)?;
    controller.toggle_task_completion(overdue.id())?;
    controller.dispatch(ViewIntent::Search {
        query: "plants".to_string(),
    })?;
    controller.dispatch(ViewIntent::Filter(TaskFilterKind::All))?;

    controller.sign_out();
    info!("event=cli_session module=cli status=ok");
    Ok(())
}
