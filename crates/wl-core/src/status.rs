//! Task status labels and status extraction from log entries.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entry::ActivityLogEntry;

/// Status of a task.
///
/// The four well-known states drive time accounting. Any other label is kept
/// verbatim so unknown or future states never break replay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    OnHold,
    Completed,
    Other(String),
}

impl TaskStatus {
    /// Canonical label.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::OnHold => "onhold",
            Self::Completed => "completed",
            Self::Other(label) => label,
        }
    }

    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Parses a status label, accepting common spellings of the well-known
    /// states (`in_progress`, `On Hold`, ...). Anything else becomes
    /// [`TaskStatus::Other`] with the trimmed label.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        let canonical = trimmed.to_ascii_lowercase().replace(['_', ' '], "-");
        match canonical.as_str() {
            "pending" => Self::Pending,
            "in-progress" | "inprogress" => Self::InProgress,
            "onhold" | "on-hold" => Self::OnHold,
            "completed" => Self::Completed,
            _ => Self::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl Serialize for TaskStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_label(&s))
    }
}

/// Description substrings tried in order when an entry has no structured
/// status. First match wins.
const DESCRIPTION_RULES: &[(&str, TaskStatus)] = &[
    ("in-progress", TaskStatus::InProgress),
    ("onhold", TaskStatus::OnHold),
    ("completed", TaskStatus::Completed),
    ("pending", TaskStatus::Pending),
];

/// Outcome of reading the new status from a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Read from the structured `newValues.status` field.
    Structured(TaskStatus),
    /// Inferred from the free-text description.
    Inferred(TaskStatus),
    /// Neither source named a status.
    Unknown,
}

impl Extracted {
    pub fn into_status(self) -> Option<TaskStatus> {
        match self {
            Self::Structured(status) | Self::Inferred(status) => Some(status),
            Self::Unknown => None,
        }
    }
}

/// Extracts the new status from a log entry.
///
/// The structured field wins whenever it is present and non-blank. Otherwise
/// the description is matched case-insensitively against
/// [`DESCRIPTION_RULES`]. No match yields [`Extracted::Unknown`] rather than
/// a guess.
pub fn extract_status(entry: &ActivityLogEntry) -> Extracted {
    if let Some(label) = entry.new_status.as_deref().filter(|s| !s.trim().is_empty()) {
        return Extracted::Structured(TaskStatus::from_label(label));
    }

    let description = entry
        .description
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let inferred = DESCRIPTION_RULES
        .iter()
        .find(|(needle, _)| description.contains(needle))
        .map(|(_, status)| status.clone());

    if let Some(status) = inferred {
        tracing::debug!(
            task_id = %entry.task_id,
            timestamp = %entry.timestamp,
            status = %status,
            "status inferred from description"
        );
        Extracted::Inferred(status)
    } else {
        tracing::warn!(
            task_id = %entry.task_id,
            timestamp = %entry.timestamp,
            description = ?entry.description,
            "status change without a recognizable status"
        );
        Extracted::Unknown
    }
}
