//! Per-task time summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::format::format_duration;
use crate::normalize::NormalizedLog;
use crate::replay::{Replay, ReplayConfig, StatusInterval, replay};
use crate::status::TaskStatus;
use crate::types::TaskId;

/// Active time and status trail for one task, evaluated at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimeSummary {
    pub task_id: TaskId,
    /// Whole seconds spent in progress, never negative.
    pub total_seconds: u64,
    pub display_text: String,
    pub current_status: TaskStatus,
    pub status_history: Vec<StatusInterval>,
}

impl TaskTimeSummary {
    /// Summary for a task with no usable log.
    pub fn empty(task_id: TaskId) -> Self {
        Self {
            task_id,
            total_seconds: 0,
            display_text: format_duration(0),
            current_status: TaskStatus::Pending,
            status_history: Vec::new(),
        }
    }
}

impl Replay {
    /// Resolves any open in-progress interval against `now`.
    ///
    /// The open interval only contributes to the returned summary; the replay
    /// itself is untouched, so repeated calls with a later `now` never
    /// decrease the total.
    pub fn resolve(self, now: DateTime<Utc>) -> TaskTimeSummary {
        let total_seconds = u64::try_from(self.active_at(now).num_seconds()).unwrap_or(0);
        TaskTimeSummary {
            task_id: self.task_id,
            total_seconds,
            display_text: format_duration(total_seconds),
            current_status: self.current,
            status_history: self.history,
        }
    }
}

/// Replays a normalized log and resolves it at `now`.
pub fn summarize(log: &NormalizedLog, now: DateTime<Utc>, config: &ReplayConfig) -> TaskTimeSummary {
    replay(log, config).resolve(now)
}
