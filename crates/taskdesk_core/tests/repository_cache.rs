use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::rc::Rc;
use taskdesk_core::repo::task_repo::TASKS_COLLECTION;
use taskdesk_core::{
    Clock, ManualClock, MemoryStorage, NewTask, Priority, RepoError, SequentialIdGenerator,
    SortOrder, Storage, Task, TaskFilter, TaskPatch, TaskQuery, TaskRepository, TaskSortField,
    TaskStatus,
};

struct Fixture {
    storage: Rc<MemoryStorage>,
    clock: Rc<ManualClock>,
    repo: TaskRepository,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn fixture() -> Fixture {
    let storage = Rc::new(MemoryStorage::new());
    let clock = Rc::new(ManualClock::new(start()));
    let repo = TaskRepository::new(
        storage.clone(),
        clock.clone(),
        Rc::new(SequentialIdGenerator::new("task")),
        Duration::seconds(300),
    );
    Fixture {
        storage,
        clock,
        repo,
    }
}

fn draft(title: &str) -> NewTask {
    NewTask::new("user-1", title)
}

fn create(fx: &Fixture, draft: NewTask) -> Task {
    let task = Task::create(draft, fx.clock.now()).unwrap();
    fx.repo.create(task).unwrap()
}

#[test]
fn create_assigns_id_and_round_trips() {
    let fx = fixture();
    let created = create(&fx, draft("Write report"));

    assert_eq!(created.id(), "task-1");
    let found = fx.repo.find_by_id("task-1").unwrap().unwrap();
    assert_eq!(found, created);
    assert_eq!(fx.repo.count().unwrap(), 1);
}

#[test]
fn find_after_create_is_served_from_cache() {
    let fx = fixture();
    let created = create(&fx, draft("Cached"));
    let loads_before = fx.storage.load_calls();

    let found = fx.repo.find_by_id(created.id()).unwrap();

    assert_eq!(found.as_ref().map(Task::title), Some("Cached"));
    assert_eq!(fx.storage.load_calls(), loads_before);
}

#[test]
fn update_changes_value_and_advances_updated_at() {
    let fx = fixture();
    let created = create(&fx, draft("Before"));

    fx.clock.advance(Duration::minutes(5));
    let updated = fx
        .repo
        .update(created.id(), vec![TaskPatch::Title("After".to_string())])
        .unwrap()
        .unwrap();

    assert_eq!(updated.title(), "After");
    assert!(updated.updated_at() > created.updated_at());

    let loads_before = fx.storage.load_calls();
    let found = fx.repo.find_by_id(created.id()).unwrap().unwrap();
    assert_eq!(found.title(), "After");
    assert_eq!(fx.storage.load_calls(), loads_before);
}

#[test]
fn update_with_frozen_clock_still_advances_updated_at() {
    let fx = fixture();
    let created = create(&fx, draft("Frozen"));

    let first = fx
        .repo
        .update(created.id(), vec![TaskPatch::Priority(Priority::High)])
        .unwrap()
        .unwrap();
    let second = fx
        .repo
        .update(created.id(), vec![TaskPatch::Priority(Priority::Low)])
        .unwrap()
        .unwrap();

    assert!(first.updated_at() > created.updated_at());
    assert!(second.updated_at() > first.updated_at());
}

#[test]
fn failed_patch_persists_nothing() {
    let fx = fixture();
    let created = create(&fx, draft("Keep me"));
    let saves_before = fx.storage.save_calls();

    let err = fx
        .repo
        .update(
            created.id(),
            vec![
                TaskPatch::Priority(Priority::Urgent),
                TaskPatch::Title("   ".to_string()),
            ],
        )
        .unwrap_err();

    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(fx.storage.save_calls(), saves_before);
    let stored = fx.storage.records(TASKS_COLLECTION);
    assert_eq!(stored[0]["title"], "Keep me");
    assert_eq!(stored[0]["priority"], "medium");
}

#[test]
fn delete_evicts_cache_entry() {
    let fx = fixture();
    let created = create(&fx, draft("Short lived"));
    assert!(fx.repo.cache().contains(created.id()));

    assert!(fx.repo.delete(created.id()).unwrap());

    assert!(!fx.repo.cache().contains(created.id()));
    assert_eq!(fx.repo.find_by_id(created.id()).unwrap(), None);
    assert!(!fx.repo.delete(created.id()).unwrap());
}

#[test]
fn missing_ids_are_none_or_false() {
    let fx = fixture();

    assert_eq!(fx.repo.find_by_id("nope").unwrap(), None);
    assert_eq!(
        fx.repo
            .update("nope", vec![TaskPatch::Title("x".to_string())])
            .unwrap(),
        None
    );
    assert!(!fx.repo.exists("nope").unwrap());
}

#[test]
fn expired_cache_entry_reloads_from_storage() {
    let fx = fixture();
    let created = create(&fx, draft("Aging"));

    fx.clock.advance(Duration::seconds(301));
    let loads_before = fx.storage.load_calls();
    let found = fx.repo.find_by_id(created.id()).unwrap();

    assert!(found.is_some());
    assert_eq!(fx.storage.load_calls(), loads_before + 1);
}

#[test]
fn fresh_cache_entry_masks_out_of_band_writes() {
    let fx = fixture();
    let created = create(&fx, draft("Original"));

    let mut record = fx.storage.records(TASKS_COLLECTION)[0].clone();
    record["title"] = json!("Changed elsewhere");
    fx.storage.seed(TASKS_COLLECTION, vec![record]);

    let cached = fx.repo.find_by_id(created.id()).unwrap().unwrap();
    assert_eq!(cached.title(), "Original");

    fx.clock.advance(Duration::seconds(300));
    let reloaded = fx.repo.find_by_id(created.id()).unwrap().unwrap();
    assert_eq!(reloaded.title(), "Changed elsewhere");
}

#[test]
fn duplicate_explicit_id_leaves_collection_unchanged() {
    let fx = fixture();
    let mut first = draft("First");
    first.id = Some("fixed".to_string());
    create(&fx, first);
    let saves_before = fx.storage.save_calls();

    let mut second = draft("Second");
    second.id = Some("fixed".to_string());
    let task = Task::create(second, start()).unwrap();
    let err = fx.repo.create(task).unwrap_err();

    match err {
        RepoError::Duplicate { field, value, .. } => {
            assert_eq!(field, "id");
            assert_eq!(value, "fixed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.repo.count().unwrap(), 1);
    assert_eq!(fx.storage.save_calls(), saves_before);
}

#[test]
fn invalid_persisted_record_is_reported() {
    let fx = fixture();
    fx.storage
        .seed(TASKS_COLLECTION, vec![json!({"id": "broken", "title": ""})]);

    let err = fx.repo.find_all(&TaskQuery::new()).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn find_all_does_not_touch_cache() {
    let fx = fixture();
    create(&fx, draft("One"));
    create(&fx, draft("Two"));
    let loads_before = fx.storage.load_calls();

    let all = fx.repo.find_all(&TaskQuery::new()).unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(fx.storage.load_calls(), loads_before + 1);
}

#[test]
fn priority_sort_descending_uses_urgency_rank() {
    let fx = fixture();
    for (title, priority) in [
        ("a", Priority::Low),
        ("b", Priority::Urgent),
        ("c", Priority::Medium),
        ("d", Priority::High),
    ] {
        let mut next = draft(title);
        next.priority = priority;
        create(&fx, next);
    }

    let sorted = fx
        .repo
        .find_all(&TaskQuery::new().sort(TaskSortField::Priority, SortOrder::Desc))
        .unwrap();
    let priorities: Vec<Priority> = sorted.iter().map(Task::priority).collect();

    assert_eq!(
        priorities,
        vec![Priority::Urgent, Priority::High, Priority::Medium, Priority::Low]
    );
}

#[test]
fn filters_combine_and_paginate() {
    let fx = fixture();
    for index in 0..5 {
        let mut next = draft(&format!("Work {index}"));
        next.category = Some("work".to_string());
        create(&fx, next);
        fx.clock.advance(Duration::minutes(1));
    }
    create(&fx, draft("Home"));

    let page = fx
        .repo
        .find_all(
            &TaskQuery::new()
                .filter(TaskFilter::Category("work".to_string()))
                .filter(TaskFilter::Completed(false))
                .sort(TaskSortField::CreatedAt, SortOrder::Desc)
                .offset(1)
                .limit(2),
        )
        .unwrap();

    let titles: Vec<&str> = page.iter().map(Task::title).collect();
    assert_eq!(titles, vec!["Work 3", "Work 2"]);
}

#[test]
fn overdue_flips_when_task_is_completed() {
    let fx = fixture();
    let mut late = draft("Late");
    late.due_date = Some(start() - Duration::days(1));
    let late = create(&fx, late);
    let mut later = draft("Not yet");
    later.due_date = Some(start() + Duration::days(1));
    create(&fx, later);

    let overdue = fx.repo.find_overdue(Some("user-1")).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id(), late.id());

    fx.repo
        .update(late.id(), vec![TaskPatch::Completed(true)])
        .unwrap();
    assert!(fx.repo.find_overdue(Some("user-1")).unwrap().is_empty());
}

#[test]
fn statistics_count_by_state_priority_and_category() {
    let fx = fixture();
    let mut urgent = draft("Urgent thing");
    urgent.priority = Priority::Urgent;
    urgent.due_date = Some(start() - Duration::hours(1));
    create(&fx, urgent);
    let mut done = draft("Done thing");
    done.category = Some("home".to_string());
    let done = create(&fx, done);
    fx.repo
        .update(done.id(), vec![TaskPatch::Completed(true)])
        .unwrap();
    let mut other = NewTask::new("user-2", "Someone else's");
    other.priority = Priority::Low;
    create(&fx, other);

    let stats = fx.repo.get_statistics(Some("user-1")).unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.overdue, 1);
    assert_eq!(stats.by_priority[&Priority::Urgent], 1);
    assert_eq!(stats.by_priority[&Priority::Low], 0);
    assert_eq!(stats.by_category["home"], 1);
    assert_eq!(stats.by_category["general"], 1);
    assert!((stats.completion_rate - 50.0).abs() < f64::EPSILON);

    let everyone = fx.repo.get_statistics(None).unwrap();
    assert_eq!(everyone.total, 3);
}

#[test]
fn search_and_tags_are_case_insensitive() {
    let fx = fixture();
    let mut tagged = draft("Buy MILK");
    tagged.tags = vec!["Errands".to_string(), "home".to_string()];
    create(&fx, tagged);
    create(&fx, draft("Call plumber"));

    let hits = fx.repo.search("milk", Some("user-1")).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(fx.repo.search("   ", None).unwrap().is_empty());
    assert_eq!(fx.repo.find_by_tag("ERRANDS").unwrap().len(), 1);
    assert_eq!(
        fx.repo.list_tags(Some("user-1")).unwrap(),
        vec!["errands".to_string(), "home".to_string()]
    );
}

#[test]
fn storage_trait_object_is_shared() {
    let fx = fixture();
    create(&fx, draft("Shared"));
    let as_trait: Rc<dyn Storage> = fx.storage.clone();

    let records = as_trait.load(TASKS_COLLECTION, Vec::new()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["userId"], "user-1");
    assert_eq!(records[0]["assignedTo"], "user-1");
}

#[test]
fn status_survives_an_accompanying_incomplete_flag() {
    let fx = fixture();
    let created = create(&fx, draft("Half done"));

    fx.repo
        .update(
            created.id(),
            vec![
                TaskPatch::Status(TaskStatus::InProgress),
                TaskPatch::Completed(false),
            ],
        )
        .unwrap();

    fx.clock.advance(Duration::seconds(301));
    let found = fx.repo.find_by_id(created.id()).unwrap().unwrap();
    assert_eq!(found.status(), TaskStatus::InProgress);
    assert!(!found.is_completed());
    assert_eq!(fx.storage.records(TASKS_COLLECTION)[0]["status"], "in-progress");
}

#[test]
fn category_filter_folds_non_ascii_case() {
    let fx = fixture();
    let mut summer = draft("Book flights");
    summer.category = Some("Été".to_string());
    create(&fx, summer);
    create(&fx, draft("Elsewhere"));

    let found = fx.repo.find_by_category(" ÉTÉ ").unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].category(), "été");
}
