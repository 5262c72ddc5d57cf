//! The reconciliation engine: sole owner and writer of the canonical task collection.
//!
//! Every mutation is applied in memory first, then written through to the
//! [`LocalTaskStore`] as a full snapshot, then the dashboard aggregate is
//! recomputed from scratch. A failed write never rolls back the in-memory
//! change; it is reported as a [`Diagnostic`] instead.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::aggregate::{self, DashboardAggregate, TaskFilter};
use crate::error::{Diagnostic, Error, Result};
use crate::models::Task;
use crate::storage::{decode_tasks, LocalTaskStore};

/// Whether the persisted snapshot has been read yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded,
}

/// What a `load` did to the canonical collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was persisted yet; the collection keeps its current contents.
    Empty,
    /// The collection was replaced by the persisted snapshot.
    Replaced { count: usize },
    /// The session had already mutated the collection, so the snapshot was
    /// merged by id with in-memory records taking precedence.
    Merged { count: usize, added: usize },
    /// The snapshot could not be read or decoded; the collection is unchanged.
    Failed(Diagnostic),
    /// A newer load was issued before this one finished; its result was dropped.
    Superseded,
}

/// The result of a mutation plus any non-fatal persistence problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostic: Option<Diagnostic>,
}

impl<T> Outcome<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.diagnostic.is_none()
    }
}

pub struct ReconciliationEngine {
    store: LocalTaskStore,
    tasks: Vec<Task>,
    state: LoadState,
    mutated: bool,
    // Ids dropped by `replace_all` this session; a merge must not revive them.
    removed: HashSet<Uuid>,
    focus_minutes: u32,
    aggregate: DashboardAggregate,
}

impl ReconciliationEngine {
    pub fn new(store: LocalTaskStore) -> Self {
        Self {
            store,
            tasks: Vec::new(),
            state: LoadState::Unloaded,
            mutated: false,
            removed: HashSet::new(),
            focus_minutes: 0,
            aggregate: DashboardAggregate::default(),
        }
    }

    pub fn store(&self) -> &LocalTaskStore {
        &self.store
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn aggregate(&self) -> &DashboardAggregate {
        &self.aggregate
    }

    pub fn filtered(&self, filter: TaskFilter) -> Vec<&Task> {
        filter.apply(&self.tasks)
    }

    /// Reads the persisted snapshot synchronously and applies it.
    pub fn load(&mut self) -> LoadOutcome {
        let read = self.store.read_raw();
        self.apply_loaded(read)
    }

    /// Applies the result of reading the persisted blob.
    ///
    /// Before the first mutation the snapshot replaces the collection. After
    /// it, the snapshot is merged by id so unsaved session edits survive,
    /// including tasks a `replace_all` removed.
    pub fn apply_loaded(&mut self, read: Result<Option<Vec<u8>>>) -> LoadOutcome {
        let bytes = match read {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("no persisted tasks");
                self.state = LoadState::Loaded;
                return LoadOutcome::Empty;
            }
            Err(err) => {
                let diag = Diagnostic::ReadFailed(err.to_string());
                warn!(%diag, "keeping in-memory tasks");
                return LoadOutcome::Failed(diag);
            }
        };

        let persisted = match decode_tasks(&bytes) {
            Ok(tasks) => dedupe_by_id(tasks),
            Err(err) => {
                let diag = Diagnostic::DecodeFailed(err.to_string());
                warn!(%diag, "keeping in-memory tasks");
                return LoadOutcome::Failed(diag);
            }
        };

        self.state = LoadState::Loaded;
        let outcome = if self.mutated {
            let known: HashSet<Uuid> = self.tasks.iter().map(|t| t.id).collect();
            let before = self.tasks.len();
            let removed = &self.removed;
            self.tasks.extend(
                persisted
                    .into_iter()
                    .filter(|t| !known.contains(&t.id) && !removed.contains(&t.id)),
            );
            LoadOutcome::Merged {
                count: self.tasks.len(),
                added: self.tasks.len() - before,
            }
        } else {
            self.tasks = persisted;
            LoadOutcome::Replaced {
                count: self.tasks.len(),
            }
        };
        debug!(?outcome, "loaded tasks");
        self.recompute();
        outcome
    }

    /// Adds a new incomplete task and returns its id.
    pub fn add(
        &mut self,
        title: impl Into<String>,
        due_date: DateTime<Utc>,
        estimated_minutes: u32,
    ) -> Outcome<Uuid> {
        let task = Task::new(title, due_date, estimated_minutes);
        let id = task.id;
        debug!(%id, title = %task.title, "adding task");
        self.tasks.push(task);
        self.mutated = true;
        let diagnostic = self.persist();
        self.recompute();
        Outcome {
            value: id,
            diagnostic,
        }
    }

    /// Flips completion for `id`.
    ///
    /// Returns the new completion flag, or `None` if no task has that id, in
    /// which case nothing is written.
    pub fn toggle_completion(&mut self, id: Uuid) -> Outcome<Option<bool>> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(%id, "toggle on unknown task ignored");
            return Outcome::clean(None);
        };
        task.is_completed = !task.is_completed;
        let now = task.is_completed;
        self.mutated = true;
        let diagnostic = self.persist();
        self.recompute();
        Outcome {
            value: Some(now),
            diagnostic,
        }
    }

    /// Replaces the whole collection. Duplicate ids keep their first occurrence.
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> Outcome<usize> {
        let tasks = dedupe_by_id(tasks);
        let kept: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
        self.removed
            .extend(self.tasks.iter().map(|t| t.id).filter(|id| !kept.contains(id)));
        self.removed.retain(|id| !kept.contains(id));
        self.tasks = tasks;
        self.mutated = true;
        let diagnostic = self.persist();
        self.recompute();
        Outcome {
            value: self.tasks.len(),
            diagnostic,
        }
    }

    /// Sets the externally tracked focus total shown on the dashboard.
    pub fn set_focus_minutes(&mut self, minutes: u32) {
        self.focus_minutes = minutes;
        self.recompute();
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, input: &str) -> Result<Uuid> {
        let needle = input.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(Error::InvalidArgument("task id is empty".to_string()));
        }
        if let Ok(id) = Uuid::parse_str(&needle) {
            return Ok(id);
        }
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.to_string().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.id),
            (Some(_), Some(_)) => Err(Error::AmbiguousTaskId(input.to_string())),
            (None, _) => Err(Error::TaskNotFound(input.to_string())),
        }
    }

    fn persist(&self) -> Option<Diagnostic> {
        match self.store.save_tasks(&self.tasks) {
            Ok(()) => None,
            Err(err) => {
                let diag = Diagnostic::PersistFailed(err.to_string());
                warn!(%diag, "in-memory change kept");
                Some(diag)
            }
        }
    }

    fn recompute(&mut self) {
        self.aggregate = aggregate::compute(&self.tasks, self.focus_minutes);
    }
}

fn dedupe_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        if seen.insert(task.id) {
            out.push(task);
        } else {
            warn!(id = %task.id, "dropping duplicate task id");
        }
    }
    out
}
