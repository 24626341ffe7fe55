//! Import command for loading task and activity log snapshots.
//!
//! A snapshot is what the task service hands out: task metadata plus each
//! task's raw activity log. Importing a task's log replaces whatever was
//! stored for it before.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use wl_core::{RawLogEntry, TaskId};
use wl_db::{Database, DbError, TaskRecord};

/// Snapshot file contents.
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    /// Activity logs keyed by task ID.
    #[serde(default)]
    pub logs: BTreeMap<String, Vec<RawLogEntry>>,
}

/// Counts from one import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub tasks: usize,
    pub logs: usize,
    pub entries: usize,
    pub skipped_logs: usize,
}

/// Stores a snapshot. Logs for tasks that are neither in the snapshot nor
/// already stored are skipped with a warning.
pub fn import_snapshot(db: &mut Database, snapshot: &Snapshot) -> Result<ImportStats> {
    let mut stats = ImportStats {
        tasks: db
            .upsert_tasks(&snapshot.tasks)
            .context("failed to store tasks")?,
        ..ImportStats::default()
    };

    for (raw_id, entries) in &snapshot.logs {
        let Ok(task_id) = TaskId::new(raw_id.as_str()) else {
            tracing::warn!(task_id = %raw_id, "skipping log with invalid task ID");
            stats.skipped_logs += 1;
            continue;
        };

        match db.replace_activity_log(&task_id, entries) {
            Ok(inserted) => {
                stats.logs += 1;
                stats.entries += inserted;
            }
            Err(DbError::UnknownTask(_)) => {
                tracing::warn!(task_id = %task_id, "skipping log for unknown task");
                stats.skipped_logs += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to store log for {task_id}"));
            }
        }
    }

    Ok(stats)
}

/// Runs the import command.
pub fn run<W: Write>(writer: &mut W, db: &mut Database, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;

    let stats = import_snapshot(db, &snapshot)?;
    tracing::info!(?stats, "import complete");

    writeln!(
        writer,
        "Imported {} tasks, {} logs ({} entries)",
        stats.tasks, stats.logs, stats.entries
    )?;
    if stats.skipped_logs > 0 {
        writeln!(writer, "Skipped {} logs for unknown tasks", stats.skipped_logs)?;
    }

    Ok(())
}
