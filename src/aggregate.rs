use clap::ValueEnum;
use serde::Serialize;

use crate::models::{Task, TaskLike, UpcomingEntry};

/// Derived dashboard statistics.
///
/// Always recomputed from the whole collection; never persisted or patched.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAggregate {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub upcoming_tasks: usize,
    pub upcoming_task_list: Vec<UpcomingEntry>,
    /// Focus minutes supplied by the focus timer; passed through untouched.
    pub total_study_time: u32,
}

impl DashboardAggregate {
    /// The first `limit` upcoming entries, for display.
    pub fn upcoming_preview(&self, limit: usize) -> &[UpcomingEntry] {
        let end = limit.min(self.upcoming_task_list.len());
        &self.upcoming_task_list[..end]
    }
}

/// Computes the dashboard aggregate for a task collection.
pub fn compute(tasks: &[Task], total_study_time: u32) -> DashboardAggregate {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.is_completed).count();
    let upcoming_task_list = upcoming_list(tasks);
    debug_assert_eq!(total_tasks - completed_tasks, upcoming_task_list.len());

    DashboardAggregate {
        total_tasks,
        completed_tasks,
        upcoming_tasks: upcoming_task_list.len(),
        upcoming_task_list,
        total_study_time,
    }
}

/// Incomplete tasks ordered by due date, earliest first.
///
/// Undated entries sort last. `sort_by` is stable, so equal dates keep input order.
pub fn upcoming_list<T: TaskLike>(tasks: &[T]) -> Vec<UpcomingEntry> {
    let mut upcoming: Vec<UpcomingEntry> = tasks
        .iter()
        .filter(|t| !t.is_completed())
        .map(UpcomingEntry::from_task_like)
        .collect();
    upcoming.sort_by(|a, b| match (a.due, b.due) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    upcoming
}

/// Which tasks a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TaskFilter {
    #[default]
    All,
    Completed,
    #[value(name = "todo")]
    ToDo,
}

impl TaskFilter {
    pub fn matches<T: TaskLike + ?Sized>(self, task: &T) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Completed => task.is_completed(),
            TaskFilter::ToDo => !task.is_completed(),
        }
    }

    /// Selects matching tasks, keeping collection order.
    pub fn apply<T: TaskLike>(self, tasks: &[T]) -> Vec<&T> {
        tasks.iter().filter(|t| self.matches(*t)).collect()
    }

    pub fn title(self) -> &'static str {
        match self {
            TaskFilter::All => "All Tasks",
            TaskFilter::Completed => "Completed Tasks",
            TaskFilter::ToDo => "To Do",
        }
    }
}
