//! Task command: active time and status trail for a single task.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use wl_core::{ReplayConfig, Task, TaskId, TaskTimeSummary, normalize, summarize};
use wl_db::{Database, LogSource};

/// Evaluates one task's log at `now`.
pub fn summarize_task(
    db: &Database,
    task_id: &TaskId,
    now: DateTime<Utc>,
    config: &ReplayConfig,
) -> Result<(Task, TaskTimeSummary)> {
    let task = db
        .get_task(task_id)?
        .with_context(|| format!("task not found: {task_id}"))?;
    let raw = db
        .activity_log(task_id)
        .with_context(|| format!("failed to load activity log for {task_id}"))?;

    let log = normalize(task_id, &raw);
    if log.dropped() > 0 {
        tracing::warn!(task_id = %task_id, dropped = log.dropped(), "ignored entries without a usable timestamp");
    }

    Ok((task, summarize(&log, now, config)))
}

/// Writes the human-readable view of a summary.
pub fn write_summary<W: Write>(
    writer: &mut W,
    task: &Task,
    summary: &TaskTimeSummary,
) -> std::io::Result<()> {
    match &task.title {
        Some(title) => writeln!(writer, "TASK {}: {title}", task.id)?,
        None => writeln!(writer, "TASK {}", task.id)?,
    }
    writeln!(writer, "Status:      {}", summary.current_status)?;
    writeln!(writer, "Active time: {}", summary.display_text)?;
    writeln!(writer)?;

    if summary.status_history.is_empty() {
        writeln!(writer, "No status changes recorded.")?;
        return Ok(());
    }

    writeln!(writer, "HISTORY")?;
    writeln!(writer, "───────")?;
    for change in &summary.status_history {
        let time = change.time.to_rfc3339_opts(SecondsFormat::Secs, true);
        write!(writer, "{time}  {} -> {}", change.from, change.to)?;
        if let Some(description) = &change.description {
            write!(writer, "  ({description})")?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    id: &str,
    now: DateTime<Utc>,
    config: &ReplayConfig,
    json: bool,
) -> Result<()> {
    let task_id = TaskId::new(id)?;
    let (task, summary) = summarize_task(db, &task_id, now, config)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        write_summary(writer, &task, &summary)?;
    }

    Ok(())
}
