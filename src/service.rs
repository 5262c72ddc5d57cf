//! Runs a [`ReconciliationEngine`] on a single tokio task.
//!
//! All reads and writes of the canonical collection happen on that task.
//! Callers talk to it through an [`EngineHandle`]; slow blob reads run on the
//! blocking pool and their results are queued back onto the same channel as
//! every other command. While a load is reading, later commands wait and are
//! replayed in arrival order once it has been applied, so a write-through can
//! never clobber the snapshot a pending load is about to read.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::aggregate::{DashboardAggregate, TaskFilter};
use crate::engine::{LoadOutcome, Outcome, ReconciliationEngine};
use crate::error::{Error, Result};
use crate::models::Task;

const COMMAND_BUFFER: usize = 64;

enum Command {
    Load {
        reply: oneshot::Sender<LoadOutcome>,
    },
    LoadFinished {
        generation: u64,
        read: Result<Option<Vec<u8>>>,
        reply: oneshot::Sender<LoadOutcome>,
    },
    Op(Op),
}

/// Commands applied directly to the engine.
enum Op {
    Add {
        title: String,
        due_date: DateTime<Utc>,
        estimated_minutes: u32,
        reply: oneshot::Sender<Outcome<Uuid>>,
    },
    Toggle {
        id: Uuid,
        reply: oneshot::Sender<Outcome<Option<bool>>>,
    },
    ReplaceAll {
        tasks: Vec<Task>,
        reply: oneshot::Sender<Outcome<usize>>,
    },
    SetFocusMinutes {
        minutes: u32,
        reply: oneshot::Sender<()>,
    },
    Tasks {
        filter: TaskFilter,
        reply: oneshot::Sender<Vec<Task>>,
    },
    Resolve {
        input: String,
        reply: oneshot::Sender<Result<Uuid>>,
    },
}

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    aggregates: watch::Receiver<DashboardAggregate>,
}

/// Moves `engine` onto its own task.
///
/// The task ends once every handle is dropped and hands the engine back
/// through the returned `JoinHandle`.
pub fn spawn(engine: ReconciliationEngine) -> (EngineHandle, JoinHandle<ReconciliationEngine>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (agg_tx, agg_rx) = watch::channel(engine.aggregate().clone());
    let weak = tx.downgrade();
    let join = tokio::spawn(run(engine, rx, weak, agg_tx));
    (
        EngineHandle {
            tx,
            aggregates: agg_rx,
        },
        join,
    )
}

async fn run(
    mut engine: ReconciliationEngine,
    mut rx: mpsc::Receiver<Command>,
    weak: mpsc::WeakSender<Command>,
    aggregates: watch::Sender<DashboardAggregate>,
) -> ReconciliationEngine {
    let mut latest_load = 0u64;
    let mut loads_in_flight = 0usize;
    // Commands that arrived while a load was reading; replayed once it lands.
    let mut deferred: VecDeque<Op> = VecDeque::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Load { reply } => {
                latest_load += 1;
                loads_in_flight += 1;
                spawn_read(&engine, &weak, latest_load, reply);
            }
            Command::LoadFinished {
                generation,
                read,
                reply,
            } => {
                loads_in_flight -= 1;
                let outcome = if generation < latest_load {
                    debug!(generation, latest_load, "dropping superseded load");
                    LoadOutcome::Superseded
                } else {
                    engine.apply_loaded(read)
                };
                aggregates.send_replace(engine.aggregate().clone());
                let _ = reply.send(outcome);

                if loads_in_flight == 0 {
                    while let Some(op) = deferred.pop_front() {
                        apply(&mut engine, &aggregates, op);
                    }
                }
            }
            Command::Op(op) if loads_in_flight > 0 => deferred.push_back(op),
            Command::Op(op) => apply(&mut engine, &aggregates, op),
        }
    }

    debug!("engine task stopping");
    engine
}

/// Reads the blob on the blocking pool and queues the result back onto the engine task.
fn spawn_read(
    engine: &ReconciliationEngine,
    weak: &mpsc::WeakSender<Command>,
    generation: u64,
    reply: oneshot::Sender<LoadOutcome>,
) {
    let store = engine.store().clone();
    let weak = weak.clone();
    tokio::spawn(async move {
        let read = tokio::task::spawn_blocking(move || store.read_raw())
            .await
            .map_err(Error::from)
            .and_then(|read| read);
        // No upgrade means every handle is gone and nobody is waiting.
        if let Some(tx) = weak.upgrade() {
            let _ = tx
                .send(Command::LoadFinished {
                    generation,
                    read,
                    reply,
                })
                .await;
        }
    });
}

fn apply(
    engine: &mut ReconciliationEngine,
    aggregates: &watch::Sender<DashboardAggregate>,
    op: Op,
) {
    match op {
        Op::Add {
            title,
            due_date,
            estimated_minutes,
            reply,
        } => {
            let outcome = engine.add(title, due_date, estimated_minutes);
            aggregates.send_replace(engine.aggregate().clone());
            let _ = reply.send(outcome);
        }
        Op::Toggle { id, reply } => {
            let outcome = engine.toggle_completion(id);
            aggregates.send_replace(engine.aggregate().clone());
            let _ = reply.send(outcome);
        }
        Op::ReplaceAll { tasks, reply } => {
            let outcome = engine.replace_all(tasks);
            aggregates.send_replace(engine.aggregate().clone());
            let _ = reply.send(outcome);
        }
        Op::SetFocusMinutes { minutes, reply } => {
            engine.set_focus_minutes(minutes);
            aggregates.send_replace(engine.aggregate().clone());
            let _ = reply.send(());
        }
        Op::Tasks { filter, reply } => {
            let tasks = engine.filtered(filter).into_iter().cloned().collect();
            let _ = reply.send(tasks);
        }
        Op::Resolve { input, reply } => {
            let _ = reply.send(engine.resolve_id(&input));
        }
    }
}

impl EngineHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::EngineClosed)?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// Loads the persisted snapshot without blocking the engine task.
    pub async fn load(&self) -> Result<LoadOutcome> {
        self.request(|reply| Command::Load { reply }).await
    }

    pub async fn add(
        &self,
        title: impl Into<String>,
        due_date: DateTime<Utc>,
        estimated_minutes: u32,
    ) -> Result<Outcome<Uuid>> {
        let title = title.into();
        self.request(|reply| Command::Op(Op::Add {
            title,
            due_date,
            estimated_minutes,
            reply,
        }))
        .await
    }

    pub async fn toggle_completion(&self, id: Uuid) -> Result<Outcome<Option<bool>>> {
        self.request(|reply| Command::Op(Op::Toggle { id, reply })).await
    }

    pub async fn replace_all(&self, tasks: Vec<Task>) -> Result<Outcome<usize>> {
        self.request(|reply| Command::Op(Op::ReplaceAll { tasks, reply }))
            .await
    }

    pub async fn set_focus_minutes(&self, minutes: u32) -> Result<()> {
        self.request(|reply| Command::Op(Op::SetFocusMinutes { minutes, reply }))
            .await
    }

    /// Snapshot of the tasks matching `filter`, in collection order.
    pub async fn tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.request(|reply| Command::Op(Op::Tasks { filter, reply }))
            .await
    }

    pub async fn resolve_id(&self, input: &str) -> Result<Uuid> {
        let input = input.to_string();
        self.request(|reply| Command::Op(Op::Resolve { input, reply }))
            .await?
    }

    /// The most recently published aggregate.
    pub fn aggregate(&self) -> DashboardAggregate {
        self.aggregates.borrow().clone()
    }

    /// Receiver that observes every published aggregate.
    pub fn subscribe(&self) -> watch::Receiver<DashboardAggregate> {
        self.aggregates.clone()
    }
}
