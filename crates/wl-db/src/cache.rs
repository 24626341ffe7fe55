//! Memoization of fetched activity logs.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use wl_core::{RawLogEntry, TaskId};

use crate::{DbError, LogSource};

/// Caches activity logs per task so repeated evaluations do not refetch.
///
/// Entries live until the caller invalidates them; the cache never expires
/// anything on its own.
#[derive(Debug, Default)]
pub struct LogCache {
    logs: HashMap<TaskId, Vec<RawLogEntry>>,
}

impl LogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached log for `task_id`, fetching it from `source` on a miss.
    pub fn get<S: LogSource + ?Sized>(
        &mut self,
        source: &S,
        task_id: &TaskId,
    ) -> Result<&[RawLogEntry], DbError> {
        match self.logs.entry(task_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_slice()),
            Entry::Vacant(entry) => {
                let log = source.activity_log(task_id)?;
                tracing::debug!(task_id = %task_id, entries = log.len(), "cached activity log");
                Ok(entry.insert(log).as_slice())
            }
        }
    }

    /// Returns the cached log without fetching.
    pub fn peek(&self, task_id: &TaskId) -> Option<&[RawLogEntry]> {
        self.logs.get(task_id).map(Vec::as_slice)
    }

    /// Drops one task's log so the next `get` refetches it.
    pub fn invalidate(&mut self, task_id: &TaskId) -> bool {
        self.logs.remove(task_id).is_some()
    }

    /// Drops every cached log.
    pub fn clear(&mut self) {
        self.logs.clear();
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}
