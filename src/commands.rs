use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::aggregate::{DashboardAggregate, TaskFilter};
use crate::engine::LoadOutcome;
use crate::error::{Diagnostic, Error, Result};
use crate::models::{UpcomingEntry, ESTIMATE_PRESETS};
use crate::remote::{RemoteProjection, RemoteTaskMirror};
use crate::service::EngineHandle;
use crate::sync::RemoteTaskList;

/// Parses a due date given as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` (local time) or RFC 3339.
pub fn parse_due(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid due date '{input}'. Use YYYY-MM-DD or YYYY-MM-DD HH:MM"
            ))
        })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidArgument(format!("'{input}' does not exist in local time")))
}

/// Validates a title entered by the user.
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("task title is empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Accepts only the preset estimates offered by the add form.
pub fn validate_estimate(minutes: u32) -> Result<u32> {
    if ESTIMATE_PRESETS.contains(&minutes) {
        Ok(minutes)
    } else {
        Err(Error::InvalidArgument(format!(
            "estimate must be one of {ESTIMATE_PRESETS:?} minutes"
        )))
    }
}

fn report(diagnostic: Option<&Diagnostic>, silent: bool) {
    if let Some(diag) = diagnostic {
        if !silent {
            eprintln!("warning: {diag}");
        }
    }
}

/// Loads persisted tasks, printing a warning if the snapshot is unreadable.
pub async fn cmd_load(engine: &EngineHandle, silent: bool) -> Result<LoadOutcome> {
    let outcome = engine.load().await?;
    if let LoadOutcome::Failed(diag) = &outcome {
        report(Some(diag), silent);
    }
    Ok(outcome)
}

/// Adds a new task to the local collection.
pub async fn cmd_add(
    engine: &EngineHandle,
    title: &str,
    due: &str,
    minutes: u32,
    silent: bool,
) -> Result<uuid::Uuid> {
    let title = validate_title(title)?;
    let due_date = parse_due(due)?;
    let minutes = validate_estimate(minutes)?;
    let outcome = engine.add(title, due_date, minutes).await?;
    report(outcome.diagnostic.as_ref(), silent);
    if !silent {
        println!("Task added (id = {})", outcome.value);
    }
    Ok(outcome.value)
}

/// Toggles completion of a task given by id or unique id prefix.
pub async fn cmd_toggle(engine: &EngineHandle, id: &str, silent: bool) -> Result<Option<bool>> {
    let id = engine.resolve_id(id).await?;
    let outcome = engine.toggle_completion(id).await?;
    report(outcome.diagnostic.as_ref(), silent);
    if !silent {
        match outcome.value {
            Some(true) => println!("Task {id} marked as complete."),
            Some(false) => println!("Task {id} marked as not complete."),
            None => println!("Task {id} not found; nothing changed."),
        }
    }
    Ok(outcome.value)
}

/// Lists tasks matching `filter` in a formatted table, soonest due first.
pub async fn cmd_list(engine: &EngineHandle, filter: TaskFilter) -> Result<()> {
    let mut tasks = engine.tasks(filter).await?;
    println!("{}", filter.title());
    if tasks.is_empty() {
        println!("No tasks to display.");
        return Ok(());
    }
    tasks.sort_by_key(|t| t.due_date);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Est").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    let now = Utc::now();
    for t in tasks {
        let overdue = !t.is_completed && t.due_date < now;
        let status = if t.is_completed { "Done" } else { "Pending" };
        let status_color = if t.is_completed { Color::Green } else { Color::Yellow };
        let id = t.id.to_string();
        table.add_row(vec![
            Cell::new(&id[..8]),
            Cell::new(&t.title),
            Cell::new(t.due_date.with_timezone(&Local).format("%Y-%m-%d %H:%M"))
                .fg(if overdue { Color::Red } else { Color::Reset }),
            Cell::new(format!("{} min", t.estimated_minutes)),
            Cell::new(status).fg(status_color),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn summary_table(total: usize, completed: usize, upcoming: usize, study: Option<u32>) -> Table {
    let mut header = vec![
        Cell::new("Total Tasks").add_attribute(Attribute::Bold),
        Cell::new("Completed").add_attribute(Attribute::Bold),
        Cell::new("To Do").add_attribute(Attribute::Bold),
    ];
    let mut row = vec![
        Cell::new(total),
        Cell::new(completed).fg(Color::Green),
        Cell::new(upcoming).fg(Color::Yellow),
    ];
    if let Some(minutes) = study {
        header.push(Cell::new("Study Time").add_attribute(Attribute::Bold));
        row.push(Cell::new(format!("{minutes}m")));
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);
    table.add_row(row);
    table
}

fn print_upcoming(entries: &[UpcomingEntry]) {
    println!("Upcoming Tasks");
    if entries.is_empty() {
        println!("No upcoming tasks. Enjoy your day!");
        return;
    }
    for entry in entries {
        let mark = if entry.completed { "[x]" } else { "[ ]" };
        println!("  {mark} {}  ({})", entry.title, entry.due_label());
    }
}

/// Prints the summary cards and the first `limit` upcoming tasks.
pub fn cmd_dashboard(aggregate: &DashboardAggregate, limit: usize) {
    let table = summary_table(
        aggregate.total_tasks,
        aggregate.completed_tasks,
        aggregate.upcoming_tasks,
        Some(aggregate.total_study_time),
    );
    println!("{table}");
    print_upcoming(aggregate.upcoming_preview(limit));
}

/// Prints the remote-sourced summary. A failed read prints a warning and an empty summary.
pub async fn cmd_remote_summary(
    mirror: &RemoteTaskMirror,
    user_id: &str,
    limit: usize,
) -> RemoteProjection {
    let projection = mirror.project(user_id).await;
    report(projection.error.as_ref(), false);
    println!(
        "{}",
        summary_table(
            projection.total_tasks,
            projection.completed_tasks,
            projection.upcoming_tasks,
            None,
        )
    );
    let end = limit.min(projection.upcoming_task_list.len());
    print_upcoming(&projection.upcoming_task_list[..end]);
    projection
}

pub async fn cmd_remote_add(
    list: &mut RemoteTaskList,
    title: &str,
    description: &str,
    due: Option<&str>,
    silent: bool,
) -> Result<String> {
    let title = validate_title(title)?;
    let due_date = due.map(parse_due).transpose()?;
    let task = list.create(title, description, due_date).await?;
    if !silent {
        println!("Remote task added (id = {})", task.id);
    }
    Ok(task.id)
}

pub async fn cmd_remote_toggle(list: &mut RemoteTaskList, id: &str, silent: bool) -> Result<bool> {
    list.refresh().await?;
    let id = list.resolve_id(id)?;
    let now = list.toggle(&id).await?;
    if !silent {
        let state = if now { "complete" } else { "not complete" };
        println!("Remote task {id} marked as {state}.");
    }
    Ok(now)
}

pub async fn cmd_remote_delete(list: &mut RemoteTaskList, id: &str, silent: bool) -> Result<()> {
    list.refresh().await?;
    let id = list.resolve_id(id)?;
    list.delete(&id).await?;
    if !silent {
        println!("Remote task {id} removed.");
    }
    Ok(())
}
