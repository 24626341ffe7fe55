//! Storage layer for the worklog.
//!
//! Persists task metadata and raw activity log entries using `rusqlite`, and
//! serves them back in the shape the log service returns (`GetActivityLog`).
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! Task creation times are normalized to RFC 3339 UTC with millisecond
//! precision on write, so lexicographic ordering matches chronological
//! ordering. Activity log timestamps are stored exactly as received: the log is
//! best-effort and unparseable values are dropped later, during normalization.

mod cache;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Deserialize;
use thiserror::Error;
use wl_core::{NewValues, RawLogEntry, Task, TaskId, ValidationError, parse_timestamp};

pub use cache::LogCache;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored or submitted identifier failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Failed to parse a task creation timestamp.
    #[error("invalid timestamp for task {task_id}: {timestamp}")]
    TimestampParse { task_id: String, timestamp: String },
    /// Log entries were submitted for a task that does not exist.
    #[error("unknown task: {0}")]
    UnknownTask(String),
}

/// Source of raw activity logs, keyed by task.
///
/// Implemented by [`Database`]; [`LogCache`] memoizes any implementation.
pub trait LogSource {
    /// Returns the task's log in recorded order. Unknown tasks yield an empty log.
    fn activity_log(&self, task_id: &TaskId) -> Result<Vec<RawLogEntry>, DbError>;
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Task metadata as submitted by the task service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                title TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);

            -- Activity log: raw status-change audit entries
            -- created_at: as received from the source, possibly malformed
            -- new_status: structured status from newValues, if any
            CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL,
                action TEXT NOT NULL,
                created_at TEXT,
                new_status TEXT,
                description TEXT,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_activity_log_task ON activity_log(task_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts or updates task metadata. Returns the number of rows written.
    pub fn upsert_tasks(&mut self, tasks: &[TaskRecord]) -> Result<usize, DbError> {
        if tasks.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO tasks (id, created_at, title)
                VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    created_at = excluded.created_at,
                    title = excluded.title
                ",
            )?;
            for task in tasks {
                let id = TaskId::new(task.id.as_str())?;
                let created_at = parse_task_timestamp(&task.created_at, id.as_str())?;
                written += stmt.execute(params![
                    id.as_str(),
                    format_timestamp(created_at),
                    task.title
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Lists tasks ordered by creation time then ID.
    pub fn list_tasks(&self) -> Result<Vec<Task>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, created_at, title
            FROM tasks
            ORDER BY created_at ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        let mut tasks = Vec::new();
        for row in rows {
            let (id, created_at, title) = row?;
            tasks.push(build_task(id, &created_at, title)?);
        }
        Ok(tasks)
    }

    /// Looks up a single task.
    pub fn get_task(&self, task_id: &TaskId) -> Result<Option<Task>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, created_at, title FROM tasks WHERE id = ?",
                [task_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, created_at, title)| build_task(id, &created_at, title))
            .transpose()
    }

    /// Appends entries to a task's log. Returns the number of entries stored.
    pub fn append_activity_log(
        &mut self,
        task_id: &TaskId,
        entries: &[RawLogEntry],
    ) -> Result<usize, DbError> {
        self.ensure_task(task_id)?;
        let tx = self.conn.transaction()?;
        let inserted = insert_entries(&tx, task_id, entries)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Replaces a task's log with a freshly fetched snapshot.
    pub fn replace_activity_log(
        &mut self,
        task_id: &TaskId,
        entries: &[RawLogEntry],
    ) -> Result<usize, DbError> {
        self.ensure_task(task_id)?;
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM activity_log WHERE task_id = ?",
            [task_id.as_str()],
        )?;
        let inserted = insert_entries(&tx, task_id, entries)?;
        tx.commit()?;
        tracing::debug!(task_id = %task_id, removed, inserted, "replaced activity log");
        Ok(inserted)
    }

    /// Removes a task's log. Returns the number of entries deleted.
    pub fn clear_activity_log(&mut self, task_id: &TaskId) -> Result<usize, DbError> {
        Ok(self.conn.execute(
            "DELETE FROM activity_log WHERE task_id = ?",
            [task_id.as_str()],
        )?)
    }

    fn ensure_task(&self, task_id: &TaskId) -> Result<(), DbError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM tasks WHERE id = ?",
                [task_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(DbError::UnknownTask(task_id.to_string()));
        }
        Ok(())
    }
}

impl LogSource for Database {
    fn activity_log(&self, task_id: &TaskId) -> Result<Vec<RawLogEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT action, created_at, new_status, description
            FROM activity_log
            WHERE task_id = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([task_id.as_str()], |row| {
            let new_status: Option<String> = row.get(2)?;
            Ok(RawLogEntry {
                action: row.get(0)?,
                created_at: row.get(1)?,
                new_values: new_status.map(|status| NewValues {
                    status: Some(status),
                }),
                description: row.get(3)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

fn insert_entries(
    tx: &Transaction<'_>,
    task_id: &TaskId,
    entries: &[RawLogEntry],
) -> Result<usize, DbError> {
    let mut stmt = tx.prepare(
        "
        INSERT INTO activity_log (task_id, action, created_at, new_status, description)
        VALUES (?, ?, ?, ?, ?)
        ",
    )?;
    let mut inserted = 0;
    for entry in entries {
        inserted += stmt.execute(params![
            task_id.as_str(),
            entry.action,
            entry.created_at,
            entry.new_status(),
            entry.description,
        ])?;
    }
    Ok(inserted)
}

fn build_task(id: String, created_at: &str, title: Option<String>) -> Result<Task, DbError> {
    let created_at = parse_task_timestamp(created_at, &id)?;
    Ok(Task {
        id: TaskId::new(id)?,
        created_at,
        title,
    })
}

fn parse_task_timestamp(timestamp: &str, task_id: &str) -> Result<DateTime<Utc>, DbError> {
    parse_timestamp(timestamp).ok_or_else(|| DbError::TimestampParse {
        task_id: task_id.to_string(),
        timestamp: timestamp.to_string(),
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::TimeZone;

    fn task_record(id: &str, created_at: &str) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            created_at: created_at.to_string(),
            title: None,
        }
    }

    fn entry(created_at: Option<&str>, status: Option<&str>, description: Option<&str>) -> RawLogEntry {
        RawLogEntry {
            action: "status_updated".to_string(),
            created_at: created_at.map(String::from),
            new_values: status.map(|s| NewValues {
                status: Some(s.to_string()),
            }),
            description: description.map(String::from),
        }
    }

    fn db_with_task(id: &str) -> Database {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_tasks(&[task_record(id, "2024-01-01T08:00:00Z")])
            .expect("insert task");
        db
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn open_on_disk_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wl.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.upsert_tasks(&[task_record("task-1", "2024-01-01T08:00:00Z")])
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "tasks"),
            vec!["id", "created_at", "title"]
        );
        assert_eq!(
            table_columns(&db.conn, "activity_log"),
            vec![
                "id",
                "task_id",
                "action",
                "created_at",
                "new_status",
                "description",
            ]
        );
        assert!(index_names(&db.conn, "tasks").contains("idx_tasks_created"));
        assert!(index_names(&db.conn, "activity_log").contains("idx_activity_log_task"));
    }

    #[test]
    fn upsert_tasks_updates_existing_rows() {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_tasks(&[task_record("task-1", "2024-01-01T08:00:00Z")])
            .unwrap();
        db.upsert_tasks(&[TaskRecord {
            id: "task-1".to_string(),
            created_at: "2024-01-02T08:00:00+02:00".to_string(),
            title: Some("Renamed".to_string()),
        }])
        .unwrap();

        let tasks = db.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].created_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap()
        );
        assert_eq!(tasks[0].title.as_deref(), Some("Renamed"));
    }

    #[test]
    fn upsert_tasks_rejects_bad_input() {
        let mut db = Database::open_in_memory().unwrap();

        let err = db
            .upsert_tasks(&[task_record("task-1", "not a time")])
            .unwrap_err();
        assert!(matches!(err, DbError::TimestampParse { .. }));

        let err = db
            .upsert_tasks(&[task_record("", "2024-01-01T08:00:00Z")])
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        assert!(db.list_tasks().unwrap().is_empty());
    }

    #[test]
    fn list_tasks_orders_by_creation() {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_tasks(&[
            task_record("late", "2024-01-01T12:00:00Z"),
            task_record("early", "2024-01-01T07:00:00Z"),
            task_record("offset", "2024-01-01T09:00:00+01:00"),
        ])
        .unwrap();

        let ids: Vec<String> = db
            .list_tasks()
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["early", "offset", "late"]);
    }

    #[test]
    fn get_task_returns_none_for_unknown() {
        let db = db_with_task("task-1");
        assert!(db.get_task(&TaskId::new("task-1").unwrap()).unwrap().is_some());
        assert!(db.get_task(&TaskId::new("nope").unwrap()).unwrap().is_none());
    }

    #[test]
    fn activity_log_roundtrips_raw_entries_in_order() {
        let mut db = db_with_task("task-1");
        let id = TaskId::new("task-1").unwrap();
        let entries = vec![
            entry(Some("2024-01-01T09:30:00Z"), Some("completed"), None),
            entry(Some("garbage"), None, Some("moved to in-progress")),
            entry(None, Some("onhold"), None),
        ];

        let inserted = db.append_activity_log(&id, &entries).unwrap();
        assert_eq!(inserted, 3);

        let stored = db.activity_log(&id).unwrap();
        assert_eq!(stored, entries);
    }

    #[test]
    fn activity_log_for_unknown_task_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let log = db.activity_log(&TaskId::new("missing").unwrap()).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn append_to_unknown_task_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db
            .append_activity_log(&TaskId::new("missing").unwrap(), &[entry(None, None, None)])
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownTask(id) if id == "missing"));
    }

    #[test]
    fn replace_activity_log_discards_previous_entries() {
        let mut db = db_with_task("task-1");
        let id = TaskId::new("task-1").unwrap();
        db.append_activity_log(
            &id,
            &[entry(Some("2024-01-01T09:00:00Z"), Some("in-progress"), None)],
        )
        .unwrap();

        let replacement = vec![entry(Some("2024-01-01T10:00:00Z"), Some("completed"), None)];
        db.replace_activity_log(&id, &replacement).unwrap();

        assert_eq!(db.activity_log(&id).unwrap(), replacement);
    }

    #[test]
    fn clear_activity_log_removes_entries() {
        let mut db = db_with_task("task-1");
        let id = TaskId::new("task-1").unwrap();
        db.append_activity_log(&id, &[entry(None, None, None), entry(None, None, None)])
            .unwrap();

        assert_eq!(db.clear_activity_log(&id).unwrap(), 2);
        assert!(db.activity_log(&id).unwrap().is_empty());
    }
}
