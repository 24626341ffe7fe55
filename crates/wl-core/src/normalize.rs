//! Log normalization.
//!
//! Turns a raw, arbitrarily ordered activity log into a time-ordered sequence
//! of entries with parsed timestamps. Entries without a usable timestamp are
//! dropped: the log is best-effort telemetry, not a ledger.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::entry::{ActivityLogEntry, RawLogEntry};
use crate::types::TaskId;

/// Naive formats accepted when a timestamp has no offset. Read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A task's activity log, sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLog {
    task_id: TaskId,
    entries: Vec<ActivityLogEntry>,
    dropped: usize,
}

impl NormalizedLog {
    /// An empty log for a task with no recorded activity.
    pub const fn empty(task_id: TaskId) -> Self {
        Self {
            task_id,
            entries: Vec::new(),
            dropped: 0,
        }
    }

    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Entries in ascending timestamp order.
    pub fn entries(&self) -> &[ActivityLogEntry] {
        &self.entries
    }

    /// Number of raw entries discarded for lack of a valid timestamp.
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalizes a raw activity log for one task.
///
/// The sort is stable, so entries sharing a timestamp keep their original
/// relative order and replay stays deterministic for a given input.
pub fn normalize<'a, I>(task_id: &TaskId, raw: I) -> NormalizedLog
where
    I: IntoIterator<Item = &'a RawLogEntry>,
{
    let mut dropped = 0;
    let mut entries: Vec<ActivityLogEntry> = raw
        .into_iter()
        .filter_map(|entry| {
            let Some(timestamp) = entry.created_at.as_deref().and_then(parse_timestamp) else {
                tracing::debug!(
                    task_id = %task_id,
                    action = %entry.action,
                    created_at = ?entry.created_at,
                    "dropping log entry without a valid timestamp"
                );
                dropped += 1;
                return None;
            };
            Some(ActivityLogEntry {
                task_id: task_id.clone(),
                action: entry.action.clone(),
                timestamp,
                new_status: entry.new_status().map(String::from),
                description: entry.description.clone(),
            })
        })
        .collect();

    entries.sort_by_key(|entry| entry.timestamp);

    NormalizedLog {
        task_id: task_id.clone(),
        entries,
        dropped,
    }
}

/// Parses an audit timestamp.
///
/// Accepts RFC 3339 (`2024-01-01T09:00:00Z`, `2024-01-01T10:00:00+01:00`).
/// Values without an offset (`2024-01-01T09:00:00`, `2024-01-01 09:00:00`)
/// are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
