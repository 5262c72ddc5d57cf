//! Write side of the remote task collection for one signed-in user.
//!
//! Each write goes to the remote store first and is mirrored into the
//! in-memory list only once the store accepts it. This list is separate from
//! the canonical local collection and is never folded into it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::RemoteTask;
use crate::remote::{decode_documents, RemoteTaskStore};

pub struct RemoteTaskList {
    store: Arc<dyn RemoteTaskStore>,
    user_id: String,
    tasks: Vec<RemoteTask>,
    last_error: Option<String>,
}

impl RemoteTaskList {
    pub fn new(store: Arc<dyn RemoteTaskStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            tasks: Vec::new(),
            last_error: None,
        }
    }

    pub fn tasks(&self) -> &[RemoteTask] {
        &self.tasks
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Message of the most recent failed call, cleared by the next refresh.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(user_id = %self.user_id, %err, "remote task write failed");
            self.last_error = Some(err.to_string());
        }
        result
    }

    /// Replaces the list with the user's current remote tasks.
    pub async fn refresh(&mut self) -> Result<()> {
        self.last_error = None;
        let fetched = self.store.query_by_owner(&self.user_id).await;
        let docs = self.record(fetched)?;
        self.tasks = decode_documents(docs);
        debug!(user_id = %self.user_id, count = self.tasks.len(), "refreshed remote tasks");
        Ok(())
    }

    /// Creates a task owned by the current user and returns it.
    pub async fn create(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<RemoteTask> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(Error::InvalidArgument("task title is empty".to_string()));
        }
        let task = RemoteTask {
            id: Uuid::new_v4().to_string(),
            title,
            description: description.into(),
            is_completed: false,
            created_at: Utc::now(),
            due_date,
            user_id: self.user_id.clone(),
        };
        let written = self.store.put(&task).await;
        self.record(written)?;
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Replaces a task the user owns.
    pub async fn update(&mut self, task: RemoteTask) -> Result<()> {
        if task.user_id != self.user_id {
            return Err(Error::InvalidArgument(format!(
                "task {} is not owned by {}",
                task.id, self.user_id
            )));
        }
        let written = self.store.put(&task).await;
        self.record(written)?;
        if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        }
        Ok(())
    }

    /// Flips completion of a listed task and writes it back.
    pub async fn toggle(&mut self, id: &str) -> Result<bool> {
        let mut task = self
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        task.is_completed = !task.is_completed;
        let now = task.is_completed;
        self.update(task).await?;
        Ok(now)
    }

    /// Deletes a listed task. Ids not in the list are rejected without a write.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        if !self.tasks.iter().any(|t| t.id == id) {
            return Err(Error::TaskNotFound(id.to_string()));
        }
        let deleted = self.store.delete(id).await;
        self.record(deleted)?;
        self.tasks.retain(|t| t.id != id);
        Ok(())
    }

    /// Resolves a full id or unique prefix among listed tasks.
    pub fn resolve_id(&self, input: &str) -> Result<String> {
        let needle = input.trim();
        if needle.is_empty() {
            return Err(Error::InvalidArgument("task id is empty".to_string()));
        }
        if self.tasks.iter().any(|t| t.id == needle) {
            return Ok(needle.to_string());
        }
        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(needle));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.id.clone()),
            (Some(_), Some(_)) => Err(Error::AmbiguousTaskId(input.to_string())),
            (None, _) => Err(Error::TaskNotFound(input.to_string())),
        }
    }
}
