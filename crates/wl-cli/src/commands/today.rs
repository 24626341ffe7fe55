//! Today command: total active time across tasks created on the local day.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use wl_core::{
    DailyAggregate, NormalizedLog, ReplayConfig, TaskId, TaskTimeSummary, normalize,
    summarize_tasks, tasks_for_day,
};
use wl_db::{Database, LogCache};

/// One day's aggregate plus the per-task summaries behind it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayReport {
    pub date: NaiveDate,
    pub timezone: String,
    #[serde(flatten)]
    pub aggregate: DailyAggregate,
    pub tasks: Vec<TaskTimeSummary>,
}

/// Builds the report for the local day (in `tz`) containing `now`.
///
/// Logs are fetched only for tasks created inside the day, through `cache`.
/// Logs already in `cache` are reused as-is.
pub fn build_report<Tz: TimeZone>(
    db: &Database,
    cache: &mut LogCache,
    now: DateTime<Utc>,
    tz: &Tz,
    timezone: &str,
    config: &ReplayConfig,
) -> Result<DayReport> {
    let tasks = db.list_tasks().context("failed to list tasks")?;
    let day_tasks = tasks_for_day(&tasks, now, tz);

    let mut logs: HashMap<TaskId, NormalizedLog> = HashMap::new();
    for task in &day_tasks {
        let raw = cache
            .get(db, &task.id)
            .with_context(|| format!("failed to load activity log for {}", task.id))?;
        logs.insert(task.id.clone(), normalize(&task.id, raw));
    }

    let summaries = summarize_tasks(&day_tasks, &logs, now, config);
    Ok(DayReport {
        date: now.with_timezone(tz).date_naive(),
        timezone: timezone.to_string(),
        aggregate: DailyAggregate::from_summaries(&summaries),
        tasks: summaries,
    })
}

/// Writes the human-readable view of a report.
pub fn write_report<W: Write>(writer: &mut W, report: &DayReport) -> std::io::Result<()> {
    writeln!(writer, "TODAY: {} ({})", report.date, report.timezone)?;
    writeln!(writer)?;

    if report.tasks.is_empty() {
        writeln!(writer, "No tasks created today.")?;
        return Ok(());
    }

    let id_width = report
        .tasks
        .iter()
        .map(|summary| summary.task_id.as_str().len())
        .max()
        .unwrap_or_default();
    for summary in &report.tasks {
        writeln!(
            writer,
            "  {:<id_width$}  {:>11}  {}",
            summary.task_id.as_str(),
            summary.display_text,
            summary.current_status
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "Tasks:       {}", report.aggregate.task_count)?;
    writeln!(writer, "Active time: {}", report.aggregate.display_text)?;
    Ok(())
}

fn emit<W: Write>(writer: &mut W, report: &DayReport, json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(report)?)?;
    } else {
        write_report(writer, report)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    db: &Database,
    now: DateTime<Utc>,
    tz: &Tz,
    timezone: &str,
    config: &ReplayConfig,
    json: bool,
) -> Result<()> {
    let mut cache = LogCache::new();
    let report = build_report(db, &mut cache, now, tz, timezone, config)?;
    emit(writer, &report, json)
}

/// Re-evaluates the day every `interval` until interrupted.
///
/// Activity logs are fetched once per task and served from the cache on later
/// ticks, so only open in-progress intervals advance. The cache is dropped
/// when the local date rolls over.
pub fn watch<W: Write, Tz: TimeZone>(
    writer: &mut W,
    db: &Database,
    tz: &Tz,
    timezone: &str,
    config: &ReplayConfig,
    interval: Duration,
    json: bool,
) -> Result<()> {
    let mut cache = LogCache::new();
    let mut current_date: Option<NaiveDate> = None;

    loop {
        let now = Utc::now();
        let date = now.with_timezone(tz).date_naive();
        if current_date.is_some_and(|previous| previous != date) {
            tracing::debug!(%date, cached = cache.len(), "day rolled over, dropping cached logs");
            cache.clear();
        }
        current_date = Some(date);

        let report = build_report(db, &mut cache, now, tz, timezone, config)?;
        emit(writer, &report, json)?;
        if !json {
            writeln!(writer)?;
        }
        std::thread::sleep(interval);
    }
}
