use std::sync::Arc;

use cadence::engine::ReconciliationEngine;
use cadence::error::{Diagnostic, Error};
use cadence::remote::{FileRemoteStore, MemoryRemoteStore, RemoteTaskMirror, RemoteTaskStore};
use cadence::storage::{LocalTaskStore, MemoryBlobStore};
use cadence::sync::RemoteTaskList;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, d, 0, 0, 0).unwrap()
}

async fn seeded_store() -> MemoryRemoteStore {
    let store = MemoryRemoteStore::new();
    store
        .insert_raw(json!({
            "id": "r1", "title": "Lab report", "description": "",
            "isCompleted": false, "createdAt": "2025-02-05T00:00:00Z",
            "userId": "alice"
        }))
        .await;
    store
        .insert_raw(json!({
            "id": "r2", "title": "Problem set", "description": "Q1-Q4",
            "isCompleted": false, "createdAt": "2025-02-01T00:00:00Z",
            "dueDate": "2025-02-03T00:00:00Z", "userId": "alice"
        }))
        .await;
    store
        .insert_raw(json!({
            "id": "r3", "title": "Reading", "description": "",
            "isCompleted": true, "createdAt": "2025-02-02T00:00:00Z",
            "userId": "alice"
        }))
        .await;
    store
        .insert_raw(json!({
            "id": "b1", "title": "Someone else's", "description": "",
            "isCompleted": false, "createdAt": "2025-02-01T00:00:00Z",
            "userId": "bob"
        }))
        .await;
    store
}

#[tokio::test]
async fn projection_counts_only_the_owners_tasks() {
    let store = seeded_store().await;
    let mirror = RemoteTaskMirror::new(Arc::new(store));
    let projection = mirror.project("alice").await;

    assert!(projection.error.is_none());
    assert_eq!(projection.total_tasks, 3);
    assert_eq!(projection.completed_tasks, 1);
    assert_eq!(projection.upcoming_tasks, 2);

    let titles: Vec<_> = projection
        .upcoming_task_list
        .iter()
        .map(|e| e.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Problem set", "Lab report"]);
    // No due date: the creation time stands in.
    assert_eq!(projection.upcoming_task_list[1].due, Some(day(5)));
}

#[tokio::test]
async fn malformed_documents_are_skipped() {
    let store = seeded_store().await;
    store
        .insert_raw(json!({ "id": "bad", "userId": "alice", "description": "no title" }))
        .await;
    let mirror = RemoteTaskMirror::new(Arc::new(store));
    assert_eq!(mirror.project("alice").await.total_tasks, 3);
}

#[tokio::test]
async fn documents_without_creation_time_show_as_undated() {
    let store = MemoryRemoteStore::new();
    store
        .insert_raw(json!({
            "id": "a", "title": "A", "isCompleted": false,
            "createdAt": "2025-02-04T00:00:00Z", "userId": "alice"
        }))
        .await;
    store
        .insert_raw(json!({ "title": "B", "isCompleted": false, "userId": "alice" }))
        .await;
    let mirror = RemoteTaskMirror::new(Arc::new(store));

    let projection = mirror.project("alice").await;
    assert_eq!(projection.total_tasks, 2);
    assert_eq!(projection.upcoming_tasks, 2);
    let labels: Vec<_> = projection
        .upcoming_task_list
        .iter()
        .map(|e| (e.title.as_str(), e.due_label()))
        .collect();
    assert_eq!(
        labels,
        vec![("A", "2025-02-04".to_string()), ("B", "No date".to_string())]
    );
}

#[tokio::test]
async fn read_failure_yields_empty_projection_with_error() {
    let store = seeded_store().await;
    store.set_offline(true).await;
    let mirror = RemoteTaskMirror::new(Arc::new(store));

    let projection = mirror.project("alice").await;
    assert_eq!(projection.total_tasks, 0);
    assert!(projection.upcoming_task_list.is_empty());
    assert!(matches!(projection.error, Some(Diagnostic::RemoteReadFailed(_))));
}

#[tokio::test]
async fn remote_reads_never_touch_local_collection() {
    let blobs = MemoryBlobStore::new();
    let mut engine = ReconciliationEngine::new(LocalTaskStore::new(Arc::new(blobs)));
    engine.add("Local only", day(9), 30);
    let before = engine.aggregate().clone();

    let mirror = RemoteTaskMirror::new(Arc::new(seeded_store().await));
    let projection = mirror.project("alice").await;

    assert_eq!(engine.aggregate(), &before);
    assert_eq!(engine.tasks().len(), 1);
    assert_ne!(projection.total_tasks, before.total_tasks);
}

#[tokio::test]
async fn task_list_writes_then_mirrors() {
    let store = Arc::new(seeded_store().await);
    let mut list = RemoteTaskList::new(store.clone(), "alice");
    list.refresh().await.unwrap();
    assert_eq!(list.tasks().len(), 3);

    let created = list.create("Slides", "intro deck", Some(day(7))).await.unwrap();
    assert_eq!(created.user_id, "alice");
    assert_eq!(list.tasks().len(), 4);
    assert_eq!(store.query_by_owner("alice").await.unwrap().len(), 4);

    assert!(list.toggle(&created.id).await.unwrap());
    let docs = store.query_by_owner("alice").await.unwrap();
    let doc = docs.iter().find(|d| d["id"] == created.id.as_str()).unwrap();
    assert_eq!(doc["isCompleted"], true);

    list.delete("r1").await.unwrap();
    assert_eq!(list.tasks().len(), 3);
    assert_eq!(store.len().await, 4);
}

#[tokio::test]
async fn failed_write_leaves_list_unchanged() {
    let store = Arc::new(seeded_store().await);
    let mut list = RemoteTaskList::new(store.clone(), "alice");
    list.refresh().await.unwrap();

    store.set_offline(true).await;
    assert!(matches!(
        list.create("Never saved", "", None).await,
        Err(Error::Remote(_))
    ));
    assert_eq!(list.tasks().len(), 3);
    assert!(list.last_error().is_some());

    assert!(list.delete("r2").await.is_err());
    assert_eq!(list.tasks().len(), 3);
}

#[tokio::test]
async fn delete_rejects_tasks_outside_the_list() {
    let store = Arc::new(seeded_store().await);
    let mut list = RemoteTaskList::new(store.clone(), "alice");
    list.refresh().await.unwrap();

    assert!(matches!(
        list.delete("b1").await,
        Err(Error::TaskNotFound(_))
    ));
    assert!(list.delete("missing").await.is_err());
    assert_eq!(store.len().await, 4);
    assert_eq!(list.tasks().len(), 3);
}

#[tokio::test]
async fn update_rejects_foreign_task() {
    let store = Arc::new(seeded_store().await);
    let mut list = RemoteTaskList::new(store, "alice");
    list.refresh().await.unwrap();
    let mut task = list.tasks()[0].clone();
    task.user_id = "bob".into();
    assert!(matches!(
        list.update(task).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn file_store_persists_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn RemoteTaskStore> = Arc::new(FileRemoteStore::new(dir.path()));

    let mut list = RemoteTaskList::new(store.clone(), "carol");
    list.refresh().await.unwrap();
    assert!(list.tasks().is_empty());
    let task = list.create("Thesis outline", "", None).await.unwrap();

    let reopened = RemoteTaskMirror::new(Arc::new(FileRemoteStore::new(dir.path())));
    let fetched = reopened.fetch("carol").await.unwrap();
    assert_eq!(fetched, vec![task]);
    assert!(reopened.fetch("dave").await.unwrap().is_empty());
}
