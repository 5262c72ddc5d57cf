use std::sync::Arc;

use cadence::aggregate::TaskFilter;
use cadence::engine::{LoadOutcome, ReconciliationEngine};
use cadence::error::Error;
use cadence::models::Task;
use cadence::service;
use cadence::storage::{decode_tasks, encode_tasks, LocalTaskStore, MemoryBlobStore, TASKS_KEY};
use chrono::{DateTime, TimeZone, Utc};

fn due(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
}

fn spawn_with(blobs: &MemoryBlobStore) -> (service::EngineHandle, tokio::task::JoinHandle<ReconciliationEngine>) {
    let engine = ReconciliationEngine::new(LocalTaskStore::new(Arc::new(blobs.clone())));
    service::spawn(engine)
}

#[tokio::test]
async fn load_then_mutate_through_handle() {
    let blobs = MemoryBlobStore::new();
    let seeded = vec![Task::new("Seeded", due(8), 90)];
    blobs.insert(TASKS_KEY, encode_tasks(&seeded).unwrap());
    let (handle, join) = spawn_with(&blobs);

    assert_eq!(handle.load().await.unwrap(), LoadOutcome::Replaced { count: 1 });
    let id = handle.add("New", due(2), 30).await.unwrap().value;
    assert_eq!(handle.toggle_completion(id).await.unwrap().value, Some(true));

    let agg = handle.aggregate();
    assert_eq!(agg.total_tasks, 2);
    assert_eq!(agg.completed_tasks, 1);
    assert_eq!(agg.upcoming_task_list[0].title, "Seeded");

    drop(handle);
    let engine = join.await.unwrap();
    assert_eq!(engine.tasks().len(), 2);
}

#[tokio::test]
async fn aggregate_published_after_each_mutation() {
    let blobs = MemoryBlobStore::new();
    let (handle, _join) = spawn_with(&blobs);
    let mut rx = handle.subscribe();
    assert_eq!(rx.borrow_and_update().total_tasks, 0);

    handle.add("A", due(1), 30).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().total_tasks, 1);

    handle.set_focus_minutes(50).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().total_study_time, 50);
}

#[tokio::test]
async fn overlapping_loads_apply_only_the_newest() {
    let blobs = MemoryBlobStore::new();
    blobs.insert(TASKS_KEY, encode_tasks(&[Task::new("A", due(1), 30)]).unwrap());
    let (handle, _join) = spawn_with(&blobs);

    let (first, second) = tokio::join!(handle.load(), handle.load());
    assert_eq!(first.unwrap(), LoadOutcome::Superseded);
    assert_eq!(second.unwrap(), LoadOutcome::Replaced { count: 1 });
    assert_eq!(handle.aggregate().total_tasks, 1);
}

#[tokio::test]
async fn mutation_queued_during_load_is_not_lost() {
    let blobs = MemoryBlobStore::new();
    blobs.insert(TASKS_KEY, encode_tasks(&[Task::new("Persisted", due(3), 30)]).unwrap());
    let (handle, _join) = spawn_with(&blobs);

    let (loaded, added) = tokio::join!(handle.load(), handle.add("Typed early", due(1), 60));
    let added = added.unwrap();
    // The add waited for the load, so the load saw the untouched snapshot.
    assert_eq!(loaded.unwrap(), LoadOutcome::Replaced { count: 1 });
    assert!(added.is_persisted());

    let tasks = handle.tasks(TaskFilter::All).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().any(|t| t.id == added.value));

    let stored = decode_tasks(&blobs.get(TASKS_KEY).unwrap()).unwrap();
    assert_eq!(stored, tasks);
}

#[tokio::test]
async fn filtered_tasks_and_prefix_resolution() {
    let blobs = MemoryBlobStore::new();
    let (handle, _join) = spawn_with(&blobs);
    let done = handle.add("Done", due(1), 30).await.unwrap().value;
    handle.add("Open", due(2), 30).await.unwrap();
    handle.toggle_completion(done).await.unwrap();

    let completed = handle.tasks(TaskFilter::Completed).await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, done);
    assert_eq!(handle.tasks(TaskFilter::ToDo).await.unwrap()[0].title, "Open");

    let prefix = done.to_string()[..12].to_string();
    assert_eq!(handle.resolve_id(&prefix).await.unwrap(), done);
    assert!(matches!(
        handle.resolve_id("not-a-task").await,
        Err(Error::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn handle_reports_closed_engine() {
    let blobs = MemoryBlobStore::new();
    let (handle, join) = spawn_with(&blobs);
    join.abort();
    let _ = join.await;
    assert!(matches!(handle.load().await, Err(Error::EngineClosed)));
}
