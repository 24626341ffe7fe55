//! Activity log entries and task metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::TaskId;

/// An activity log entry as returned by the log service.
///
/// Every field is optional or lenient: the audit trail is best-effort and a
/// malformed entry must not poison the rest of the log. In particular
/// `created_at` is kept as the raw string and only parsed during
/// normalization, where unparseable entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogEntry {
    /// The kind of change (e.g. `status_updated`, `comment_added`).
    #[serde(default)]
    pub action: String,
    /// When the change happened, as recorded by the source.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,
    /// Structured values written by the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_values: Option<NewValues>,
    /// Free-text description of the change.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl RawLogEntry {
    /// Returns the structured status, if the entry carries one.
    pub fn new_status(&self) -> Option<&str> {
        self.new_values.as_ref()?.status.as_deref()
    }
}

/// Structured values attached to a log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewValues {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
}

/// A normalized activity log entry with a parsed timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub task_id: TaskId,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Task metadata needed to bucket tasks by day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Deserializes a string, mapping any non-string value (null, numbers,
/// objects) to `None` instead of failing.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Text(s) => Some(s),
        Lenient::Other(_) => None,
    })
}
