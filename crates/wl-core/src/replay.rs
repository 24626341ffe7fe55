//! Status replay.
//!
//! Replays a normalized activity log through the task status state machine,
//! accumulating closed in-progress intervals and the status history.
//!
//! # Algorithm Summary
//!
//! 1. Skip entries that are not status changes
//! 2. Extract the new status (structured field, then description rules)
//! 3. Ignore repeats of the current status
//! 4. Entering `in-progress` opens an interval; leaving it closes the interval
//!    and adds its length to the total
//! 5. Every accepted transition is appended to the history
//!
//! An interval still open at the end of the log is reported through
//! [`Replay::open_since`] and resolved later against a caller-supplied `now`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::normalize::NormalizedLog;
use crate::status::{TaskStatus, extract_status};
use crate::types::TaskId;

/// Configuration for status replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Actions treated as status changes, compared case-insensitively.
    /// Entries carrying a structured status are status changes regardless.
    pub status_actions: Vec<String>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            status_actions: vec![
                "status_updated".to_string(),
                "status_changed".to_string(),
                "status_change".to_string(),
            ],
        }
    }
}

impl ReplayConfig {
    fn is_status_action(&self, action: &str) -> bool {
        let action = action.trim();
        self.status_actions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(action))
    }
}

/// One recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusInterval {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of replaying one task's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub task_id: TaskId,

    /// Status after the last accepted transition.
    pub current: TaskStatus,

    /// Sum of closed in-progress intervals.
    pub closed_active: Duration,

    /// Start of the in-progress interval still open at the end of the log.
    pub open_since: Option<DateTime<Utc>>,

    /// Accepted transitions in log order.
    pub history: Vec<StatusInterval>,
}

impl Replay {
    fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            current: TaskStatus::Pending,
            closed_active: Duration::zero(),
            open_since: None,
            history: Vec::new(),
        }
    }

    fn transition(&mut self, to: TaskStatus, at: DateTime<Utc>, description: Option<String>) {
        let from = std::mem::replace(&mut self.current, to.clone());

        if to.is_in_progress() {
            self.open_since = Some(at);
        } else if from.is_in_progress() {
            if let Some(since) = self.open_since.take() {
                self.closed_active += clamp_interval(&self.task_id, since, at);
            }
        }

        self.history.push(StatusInterval {
            from,
            to,
            time: at,
            description,
        });
    }

    /// Active time as of `now`: closed intervals plus the open interval, if
    /// the task is still in progress. Nothing is written back.
    pub fn active_at(&self, now: DateTime<Utc>) -> Duration {
        match self.open_since {
            Some(since) if self.current.is_in_progress() => {
                self.closed_active + clamp_interval(&self.task_id, since, now)
            }
            _ => self.closed_active,
        }
    }

    /// Whether the task ended the log in an unresolved in-progress interval.
    pub const fn is_open(&self) -> bool {
        self.open_since.is_some() && self.current.is_in_progress()
    }
}

/// Length of `[start, end)`, clamped to zero when clocks disagree.
fn clamp_interval(task_id: &TaskId, start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
    let length = end - start;
    if length < Duration::zero() {
        tracing::warn!(
            task_id = %task_id,
            %start,
            %end,
            "negative active interval clamped to zero"
        );
        return Duration::zero();
    }
    length
}

/// Replays a normalized log through the status state machine.
pub fn replay(log: &NormalizedLog, config: &ReplayConfig) -> Replay {
    let mut state = Replay::new(log.task_id().clone());

    for entry in log.entries() {
        if entry.new_status.is_none() && !config.is_status_action(&entry.action) {
            continue;
        }

        let Some(status) = extract_status(entry).into_status() else {
            continue;
        };

        if status == state.current {
            tracing::trace!(
                task_id = %entry.task_id,
                timestamp = %entry.timestamp,
                %status,
                "repeated status ignored"
            );
            continue;
        }

        state.transition(status, entry.timestamp, entry.description.clone());
    }

    state
}
