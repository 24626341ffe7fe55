//! Daily aggregation across tasks.
//!
//! Sums active time over every task created within one local calendar day.
//! Tasks are independent, so they are evaluated in parallel.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::entry::Task;
use crate::format::format_duration;
use crate::normalize::NormalizedLog;
use crate::replay::ReplayConfig;
use crate::summary::{TaskTimeSummary, summarize};
use crate::types::TaskId;

/// Lookup from task ID to its already-normalized log.
///
/// This allows aggregation to work with whatever the caller fetched logs into
/// (a plain map in tests, a cache-backed map in the CLI).
pub trait LogLookup: Sync {
    /// Returns the log for a task, or `None` if it was never fetched.
    fn log_for(&self, task_id: &TaskId) -> Option<&NormalizedLog>;
}

impl<S: BuildHasher + Sync> LogLookup for HashMap<TaskId, NormalizedLog, S> {
    fn log_for(&self, task_id: &TaskId) -> Option<&NormalizedLog> {
        self.get(task_id)
    }
}

impl LogLookup for BTreeMap<TaskId, NormalizedLog> {
    fn log_for(&self, task_id: &TaskId) -> Option<&NormalizedLog> {
        self.get(task_id)
    }
}

/// Total active time across one day's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub total_seconds: u64,
    pub task_count: usize,
    pub display_text: String,
}

impl DailyAggregate {
    /// Folds per-task summaries into a daily total.
    pub fn from_summaries(summaries: &[TaskTimeSummary]) -> Self {
        let total_seconds = summaries.iter().map(|s| s.total_seconds).sum();
        Self {
            total_seconds,
            task_count: summaries.len(),
            display_text: format_duration(total_seconds),
        }
    }
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        // Single or ambiguous (DST fall-back): use the earlier time
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // DST spring-forward gap at midnight; 1am local exists
            let one_am = midnight + Duration::hours(1);
            tz.from_local_datetime(&one_am)
                .earliest()
                .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
        }
    }
}

/// Calculates day boundaries (00:00 to next 00:00 in `tz`) as a half-open
/// UTC interval.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (local_midnight_to_utc(date, tz), local_midnight_to_utc(next, tz))
}

/// Tasks created on the local day (in `tz`) containing `now`, in input order.
///
/// This is the only place tasks are bucketed by day; callers that fetch logs
/// should fetch them for exactly these tasks.
pub fn tasks_for_day<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<&'a Task> {
    let today = now.with_timezone(tz).date_naive();
    let (start, end) = day_bounds(today, tz);
    tracing::debug!(%today, %start, %end, "selecting tasks for day");

    tasks
        .iter()
        .filter(|task| task.created_at >= start && task.created_at < end)
        .collect()
}

/// Summarizes the given tasks at `now`, without any day filtering.
///
/// Tasks without a log in `logs` contribute zero but are still returned.
/// Output order follows `tasks`.
pub fn summarize_tasks<L>(
    tasks: &[&Task],
    logs: &L,
    now: DateTime<Utc>,
    config: &ReplayConfig,
) -> Vec<TaskTimeSummary>
where
    L: LogLookup + ?Sized,
{
    tasks
        .par_iter()
        .map(|task| {
            logs.log_for(&task.id).map_or_else(
                || {
                    tracing::debug!(task_id = %task.id, "no activity log fetched for task");
                    TaskTimeSummary::empty(task.id.clone())
                },
                |log| summarize(log, now, config),
            )
        })
        .collect()
}

/// Summarizes every task created on the local day (in `tz`) containing `now`.
pub fn summarize_day<L, Tz>(
    tasks: &[Task],
    logs: &L,
    now: DateTime<Utc>,
    tz: &Tz,
    config: &ReplayConfig,
) -> Vec<TaskTimeSummary>
where
    L: LogLookup + ?Sized,
    Tz: TimeZone,
{
    summarize_tasks(&tasks_for_day(tasks, now, tz), logs, now, config)
}

/// Aggregates active time over the local day (in `tz`) containing `now`.
pub fn aggregate_day<L, Tz>(
    tasks: &[Task],
    logs: &L,
    now: DateTime<Utc>,
    tz: &Tz,
    config: &ReplayConfig,
) -> DailyAggregate
where
    L: LogLookup + ?Sized,
    Tz: TimeZone,
{
    DailyAggregate::from_summaries(&summarize_day(tasks, logs, now, tz, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::RawLogEntry;
    use crate::normalize::normalize;
    use crate::replay::fixtures::{status_change, ts};
    use chrono::FixedOffset;
    use chrono_tz::America::{Havana, Santiago};

    fn task(id: &str, created_at: DateTime<Utc>) -> Task {
        Task {
            id: TaskId::new(id).unwrap(),
            created_at,
            title: None,
        }
    }

    fn logs(entries: &[(&str, Vec<RawLogEntry>)]) -> HashMap<TaskId, NormalizedLog> {
        entries
            .iter()
            .map(|(id, raw)| {
                let id = TaskId::new(*id).unwrap();
                let log = normalize(&id, raw);
                (id, log)
            })
            .collect()
    }

    #[test]
    fn sums_only_tasks_created_today() {
        let tasks = vec![
            task("today-a", ts(0)),
            task("today-b", ts(60)),
            task("yesterday", ts(-24 * 60)),
        ];
        let logs = logs(&[
            (
                "today-a",
                vec![status_change(ts(0), "in-progress"), status_change(ts(30), "completed")],
            ),
            (
                "today-b",
                vec![status_change(ts(60), "in-progress"), status_change(ts(70), "onhold")],
            ),
            (
                "yesterday",
                vec![status_change(ts(-600), "in-progress"), status_change(ts(60), "completed")],
            ),
        ]);

        let aggregate = aggregate_day(&tasks, &logs, ts(120), &Utc, &ReplayConfig::default());

        assert_eq!(aggregate.total_seconds, 40 * 60);
        assert_eq!(aggregate.task_count, 2);
        assert_eq!(aggregate.display_text, "40m 0s");
    }

    #[test]
    fn tasks_without_logs_count_but_contribute_nothing() {
        let tasks = vec![task("logged", ts(0)), task("unfetched", ts(5))];
        let logs = logs(&[(
            "logged",
            vec![status_change(ts(0), "in-progress"), status_change(ts(15), "completed")],
        )]);

        let summaries = summarize_day(&tasks, &logs, ts(60), &Utc, &ReplayConfig::default());

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].task_id.as_str(), "logged");
        assert_eq!(summaries[1], TaskTimeSummary::empty(TaskId::new("unfetched").unwrap()));

        let aggregate = DailyAggregate::from_summaries(&summaries);
        assert_eq!(aggregate.total_seconds, 15 * 60);
        assert_eq!(aggregate.task_count, 2);
    }

    #[test]
    fn open_tasks_advance_closed_tasks_do_not() {
        let tasks = vec![task("closed", ts(0)), task("open", ts(0))];
        let logs = logs(&[
            (
                "closed",
                vec![status_change(ts(0), "in-progress"), status_change(ts(10), "completed")],
            ),
            ("open", vec![status_change(ts(20), "in-progress")]),
        ]);
        let config = ReplayConfig::default();

        let first = summarize_day(&tasks, &logs, ts(30), &Utc, &config);
        let second = summarize_day(&tasks, &logs, ts(45), &Utc, &config);

        assert_eq!(first[0], second[0]);
        assert_eq!(first[1].total_seconds, 10 * 60);
        assert_eq!(second[1].total_seconds, 25 * 60);
        assert_eq!(
            summarize_day(&tasks, &logs, ts(45), &Utc, &config),
            second,
            "re-running with the same snapshot and now is deterministic"
        );
    }

    #[test]
    fn empty_day_aggregates_to_zero() {
        let logs: HashMap<TaskId, NormalizedLog> = HashMap::new();
        let aggregate = aggregate_day(&[], &logs, ts(0), &Utc, &ReplayConfig::default());

        assert_eq!(
            aggregate,
            DailyAggregate {
                total_seconds: 0,
                task_count: 0,
                display_text: "0s".to_string(),
            }
        );
    }

    #[test]
    fn day_is_bucketed_in_the_given_timezone() {
        // 2024-01-01T09:00Z is 14:00 at +05:00; local day runs 2023-12-31T19:00Z..2024-01-01T19:00Z.
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let tasks = vec![
            task("late-evening-utc", ts(-14 * 60 + 30)), // 2023-12-31T19:30Z, local Jan 1 00:30
            task("after-local-midnight", ts(10 * 60 + 30)), // 2024-01-01T19:30Z, local Jan 2
        ];
        let logs = logs(&[]);

        let summaries = summarize_day(&tasks, &logs, ts(0), &tz, &ReplayConfig::default());

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].task_id.as_str(), "late-evening-utc");
    }

    #[test]
    fn day_bounds_in_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (start, end) = day_bounds(date, &Utc);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn day_bounds_west_of_utc() {
        let tz = FixedOffset::west_opt(8 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        let (start, end) = day_bounds(date, &tz);

        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 29, 8, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 30, 8, 0, 0).unwrap());
    }

    #[test]
    fn day_bounds_when_midnight_repeats() {
        // Havana falls back at 01:00 CDT to 00:00 CST, so midnight happens twice.
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        let (start, end) = day_bounds(date, &Havana);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 11, 3, 4, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 11, 4, 5, 0, 0).unwrap());
        assert_eq!(end - start, Duration::hours(25));
    }

    #[test]
    fn day_bounds_when_midnight_is_skipped() {
        // Santiago springs forward at midnight; the day starts at 01:00 -03.
        let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let (start, end) = day_bounds(date, &Santiago);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 9, 9, 3, 0, 0).unwrap());
        assert_eq!(end - start, Duration::hours(23));
    }

    #[test]
    fn day_selection_uses_dst_aware_bounds() {
        let tasks = vec![
            // 00:30 CDT, the first pass through midnight on 2024-11-03.
            task("first-midnight", Utc.with_ymd_and_hms(2024, 11, 3, 4, 30, 0).unwrap()),
            // 23:30 CST on 2024-11-03.
            task("late", Utc.with_ymd_and_hms(2024, 11, 4, 4, 30, 0).unwrap()),
            // 23:30 CDT on 2024-11-02.
            task("day-before", Utc.with_ymd_and_hms(2024, 11, 3, 3, 30, 0).unwrap()),
        ];
        let now = Utc.with_ymd_and_hms(2024, 11, 3, 18, 0, 0).unwrap();

        let ids: Vec<&str> = tasks_for_day(&tasks, now, &Havana)
            .iter()
            .map(|task| task.id.as_str())
            .collect();

        assert_eq!(ids, vec!["first-midnight", "late"]);
    }

    #[test]
    fn summarize_tasks_does_not_filter_by_day() {
        let tasks = [task("yesterday", ts(-24 * 60))];
        let logs = logs(&[(
            "yesterday",
            vec![status_change(ts(-24 * 60), "in-progress"), status_change(ts(-23 * 60), "completed")],
        )]);
        let selected: Vec<&Task> = tasks.iter().collect();

        let summaries = summarize_tasks(&selected, &logs, ts(0), &ReplayConfig::default());

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_seconds, 3600);
    }

    #[test]
    fn btree_lookup_is_supported() {
        let id = TaskId::new("task-1").unwrap();
        let mut logs = BTreeMap::new();
        logs.insert(
            id.clone(),
            normalize(&id, &[status_change(ts(0), "in-progress")]),
        );

        let aggregate = aggregate_day(
            &[task("task-1", ts(0))],
            &logs,
            ts(5),
            &Utc,
            &ReplayConfig::default(),
        );

        assert_eq!(aggregate.total_seconds, 300);
    }
}
