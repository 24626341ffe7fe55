//! Core domain logic for the worklog.
//!
//! This crate reconstructs how long tasks were actively worked on from their
//! status-change audit trail:
//! - Normalization: ordering and filtering raw activity log entries
//! - Replay: the status state machine that accumulates in-progress time
//! - Summaries: resolving open intervals against a caller-supplied `now`
//! - Aggregation: daily totals across tasks created on one calendar day
//!
//! Nothing here performs I/O or reads the wall clock.

mod aggregate;
pub mod entry;
mod format;
mod normalize;
mod replay;
pub mod status;
mod summary;
pub mod types;

pub use aggregate::{
    DailyAggregate, LogLookup, aggregate_day, day_bounds, summarize_day, summarize_tasks,
    tasks_for_day,
};
pub use entry::{ActivityLogEntry, NewValues, RawLogEntry, Task};
pub use format::format_duration;
pub use normalize::{NormalizedLog, normalize, parse_timestamp};
pub use replay::{Replay, ReplayConfig, StatusInterval, replay};
pub use status::{Extracted, TaskStatus, extract_status};
pub use summary::{TaskTimeSummary, summarize};
pub use types::{TaskId, ValidationError};
