//! Read side of the remote per-user task collection.
//!
//! Remote tasks are folded into a [`RemoteProjection`] that is shown next to
//! the local dashboard but never merged into the canonical collection.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::aggregate::upcoming_list;
use crate::error::{Diagnostic, Error, Result};
use crate::models::{flexible_date, RemoteTask, TaskLike, UpcomingEntry};
use crate::storage::{BlobStore, FileBlobStore};

/// Name of the remote collection holding task documents.
pub const TASKS_COLLECTION: &str = "tasks";

/// A per-user document collection.
///
/// Documents are returned raw so a single malformed record cannot fail a whole read.
#[async_trait]
pub trait RemoteTaskStore: Send + Sync {
    /// All documents whose `userId` equals `user_id`.
    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Value>>;
    /// Creates or replaces the document with the task's id.
    async fn put(&self, task: &RemoteTask) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

fn owned_by(doc: &Value, user_id: &str) -> bool {
    doc.get("userId").and_then(Value::as_str) == Some(user_id)
}

fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

fn upsert(docs: &mut Vec<Value>, task: &RemoteTask) -> Result<()> {
    let value = serde_json::to_value(task)?;
    match docs.iter_mut().find(|d| doc_id(d) == Some(task.id.as_str())) {
        Some(existing) => *existing = value,
        None => docs.push(value),
    }
    Ok(())
}

/// In-memory document collection, used by tests.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    docs: Arc<RwLock<Vec<Value>>>,
    offline: Arc<RwLock<bool>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a raw document, bypassing schema checks.
    pub async fn insert_raw(&self, doc: Value) {
        self.docs.write().await.push(doc);
    }

    /// While offline every call fails.
    pub async fn set_offline(&self, offline: bool) {
        *self.offline.write().await = offline;
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    async fn check_online(&self) -> Result<()> {
        if *self.offline.read().await {
            return Err(Error::Remote("remote store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTaskStore for MemoryRemoteStore {
    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Value>> {
        self.check_online().await?;
        let docs = self.docs.read().await;
        Ok(docs.iter().filter(|d| owned_by(d, user_id)).cloned().collect())
    }

    async fn put(&self, task: &RemoteTask) -> Result<()> {
        self.check_online().await?;
        upsert(&mut *self.docs.write().await, task)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_online().await?;
        self.docs.write().await.retain(|d| doc_id(d) != Some(id));
        Ok(())
    }
}

/// Document collection kept as one JSON array file, for running without a backend.
#[derive(Clone)]
pub struct FileRemoteStore {
    blobs: Arc<FileBlobStore>,
}

impl FileRemoteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            blobs: Arc::new(FileBlobStore::new(dir)),
        }
    }

    async fn read_all(&self) -> Result<Vec<Value>> {
        let blobs = Arc::clone(&self.blobs);
        let bytes = tokio::task::spawn_blocking(move || blobs.read_blob(TASKS_COLLECTION)).await??;
        match bytes {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| Error::Remote(format!("corrupt collection: {err}"))),
            None => Ok(Vec::new()),
        }
    }

    async fn write_all(&self, docs: Vec<Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&docs)?;
        let blobs = Arc::clone(&self.blobs);
        tokio::task::spawn_blocking(move || blobs.write_blob(TASKS_COLLECTION, &bytes)).await?
    }
}

#[async_trait]
impl RemoteTaskStore for FileRemoteStore {
    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Value>> {
        let docs = self.read_all().await?;
        Ok(docs.into_iter().filter(|d| owned_by(d, user_id)).collect())
    }

    async fn put(&self, task: &RemoteTask) -> Result<()> {
        let mut docs = self.read_all().await?;
        upsert(&mut docs, task)?;
        self.write_all(docs).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut docs = self.read_all().await?;
        docs.retain(|d| doc_id(d) != Some(id));
        self.write_all(docs).await
    }
}

/// Decodes documents into tasks, skipping any that do not match the schema.
pub fn decode_documents(docs: Vec<Value>) -> Vec<RemoteTask> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<RemoteTask>(doc) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(%err, "skipping malformed remote task");
                None
            }
        })
        .collect()
}

/// The fields of a remote document the projection needs.
///
/// Only `title` and `isCompleted` are required, so documents written without
/// a creation time still count and show as undated.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedTask {
    pub title: String,
    pub is_completed: bool,
    #[serde(default, with = "flexible_date::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_date::option")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskLike for ProjectedTask {
    fn title(&self) -> &str {
        &self.title
    }

    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn display_due(&self) -> Option<DateTime<Utc>> {
        self.due_date.or(self.created_at)
    }
}

/// Decodes documents for display, skipping any without a title or completion flag.
pub fn project_documents(docs: Vec<Value>) -> Vec<ProjectedTask> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<ProjectedTask>(doc) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(%err, "skipping remote document without title or completion");
                None
            }
        })
        .collect()
}

/// Display-only summary of the remote collection.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProjection {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub upcoming_tasks: usize,
    pub upcoming_task_list: Vec<UpcomingEntry>,
    #[serde(skip)]
    pub error: Option<Diagnostic>,
}

impl RemoteProjection {
    pub fn from_tasks<T: TaskLike>(tasks: &[T]) -> Self {
        let completed_tasks = tasks.iter().filter(|t| t.is_completed()).count();
        let upcoming_task_list = upcoming_list(tasks);
        Self {
            total_tasks: tasks.len(),
            completed_tasks,
            upcoming_tasks: upcoming_task_list.len(),
            upcoming_task_list,
            error: None,
        }
    }

    fn failed(diag: Diagnostic) -> Self {
        Self {
            error: Some(diag),
            ..Self::default()
        }
    }
}

/// Reads a user's remote tasks for display.
#[derive(Clone)]
pub struct RemoteTaskMirror {
    store: Arc<dyn RemoteTaskStore>,
}

impl RemoteTaskMirror {
    pub fn new(store: Arc<dyn RemoteTaskStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn RemoteTaskStore> {
        Arc::clone(&self.store)
    }

    /// Fetches and decodes the user's tasks.
    pub async fn fetch(&self, user_id: &str) -> Result<Vec<RemoteTask>> {
        let docs = self.store.query_by_owner(user_id).await?;
        let total = docs.len();
        let tasks = decode_documents(docs);
        debug!(user_id, total, decoded = tasks.len(), "fetched remote tasks");
        Ok(tasks)
    }

    /// Builds the projection; a failed read yields an empty projection carrying the error.
    pub async fn project(&self, user_id: &str) -> RemoteProjection {
        match self.store.query_by_owner(user_id).await {
            Ok(docs) => RemoteProjection::from_tasks(&project_documents(docs)),
            Err(err) => {
                let diag = Diagnostic::RemoteReadFailed(err.to_string());
                warn!(%diag, "remote projection is empty");
                RemoteProjection::failed(diag)
            }
        }
    }
}
