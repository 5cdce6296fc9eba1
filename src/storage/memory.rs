//! In-memory storage implementation
//!
//! Used for non-resumable crawls and tests. Nothing here survives the
//! process, so these stores never back a resumable frontier.

use crate::storage::traits::{
    CounterStore, InFlightTracker, RunRegistry, StorageError, StorageResult, WorkQueue,
};
use crate::storage::{RunRecord, RunStatus};
use crate::url::WebUrl;
use crate::{ExecutionId, WorkerId};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    worker_id: WorkerId,
    url: WebUrl,
}

/// Work queue ordered by (priority, insertion sequence)
#[derive(Default)]
pub struct MemoryWorkQueue {
    inner: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    next_seq: u64,
    entries: BTreeMap<(u8, u64), Entry>,
}

impl QueueState {
    fn keys_for(&self, max: usize, queue_name: &str, worker_id: WorkerId) -> Vec<(u8, u64)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.name == queue_name && e.worker_id == worker_id)
            .take(max)
            .map(|(key, _)| *key)
            .collect()
    }
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkQueue for MemoryWorkQueue {
    fn put(
        &self,
        url: &WebUrl,
        queue_name: &str,
        worker_id: WorkerId,
        _execution_id: ExecutionId,
    ) -> StorageResult<()> {
        let mut state = lock(&self.inner)?;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            (url.priority, seq),
            Entry {
                name: queue_name.to_string(),
                worker_id,
                url: url.clone(),
            },
        );
        Ok(())
    }

    fn get(
        &self,
        max: usize,
        queue_name: &str,
        worker_id: WorkerId,
    ) -> StorageResult<Vec<WebUrl>> {
        let state = lock(&self.inner)?;
        Ok(state
            .keys_for(max, queue_name, worker_id)
            .iter()
            .filter_map(|key| state.entries.get(key).map(|e| e.url.clone()))
            .collect())
    }

    fn delete(&self, count: usize, queue_name: &str, worker_id: WorkerId) -> StorageResult<usize> {
        let mut state = lock(&self.inner)?;
        let keys = state.keys_for(count, queue_name, worker_id);
        for key in &keys {
            state.entries.remove(key);
        }
        Ok(keys.len())
    }

    fn clear(&self, queue_name: &str, worker_id: WorkerId) -> StorageResult<usize> {
        let mut state = lock(&self.inner)?;
        let before = state.entries.len();
        state
            .entries
            .retain(|_, e| !(e.name == queue_name && e.worker_id == worker_id));
        Ok(before - state.entries.len())
    }

    fn get_length(&self, queue_name: &str) -> StorageResult<u64> {
        let state = lock(&self.inner)?;
        Ok(state
            .entries
            .values()
            .filter(|e| e.name == queue_name)
            .count() as u64)
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

/// In-flight tracker kept in dispatch order
#[derive(Default)]
pub struct MemoryInFlightTracker {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryInFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InFlightTracker for MemoryInFlightTracker {
    fn put(
        &self,
        url: &WebUrl,
        db_name: &str,
        worker_id: WorkerId,
        _execution_id: ExecutionId,
    ) -> StorageResult<()> {
        lock(&self.entries)?.push(Entry {
            name: db_name.to_string(),
            worker_id,
            url: url.clone(),
        });
        Ok(())
    }

    fn get(&self, max: usize, db_name: &str, worker_id: WorkerId) -> StorageResult<Vec<WebUrl>> {
        Ok(lock(&self.entries)?
            .iter()
            .filter(|e| e.name == db_name && e.worker_id == worker_id)
            .take(max)
            .map(|e| e.url.clone())
            .collect())
    }

    fn delete(&self, count: usize, db_name: &str, worker_id: WorkerId) -> StorageResult<usize> {
        let mut entries = lock(&self.entries)?;
        let mut removed = 0;
        entries.retain(|e| {
            if removed < count && e.name == db_name && e.worker_id == worker_id {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    fn remove_url(&self, url: &WebUrl, worker_id: WorkerId) -> StorageResult<bool> {
        let mut entries = lock(&self.entries)?;
        match entries
            .iter()
            .position(|e| e.worker_id == worker_id && e.url == *url)
        {
            Some(index) => {
                entries.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_length(&self, db_name: &str) -> StorageResult<u64> {
        Ok(lock(&self.entries)?
            .iter()
            .filter(|e| e.name == db_name)
            .count() as u64)
    }

    fn get_worker_length(&self, db_name: &str, worker_id: WorkerId) -> StorageResult<u64> {
        Ok(lock(&self.entries)?
            .iter()
            .filter(|e| e.name == db_name && e.worker_id == worker_id)
            .count() as u64)
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

/// Counters held in a map
#[derive(Default)]
pub struct MemoryCounters {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounters {
    fn get_value(&self, name: &str) -> StorageResult<i64> {
        Ok(lock(&self.values)?.get(name).copied().unwrap_or(0))
    }

    fn increment(&self, name: &str, delta: i64) -> StorageResult<()> {
        *lock(&self.values)?.entry(name.to_string()).or_insert(0) += delta;
        Ok(())
    }

    fn reset(&self, name: &str) -> StorageResult<()> {
        lock(&self.values)?.remove(name);
        Ok(())
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

/// Run registry for a single process lifetime
#[derive(Default)]
pub struct MemoryRuns {
    runs: Mutex<Vec<RunRecord>>,
}

impl MemoryRuns {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunRegistry for MemoryRuns {
    fn create_run(&self, config_hash: &str) -> StorageResult<ExecutionId> {
        let mut runs = lock(&self.runs)?;
        let id = runs.len() as ExecutionId + 1;
        runs.push(RunRecord {
            id,
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            config_hash: config_hash.to_string(),
            status: RunStatus::Running,
        });
        Ok(id)
    }

    fn get_run(&self, run_id: ExecutionId) -> StorageResult<RunRecord> {
        lock(&self.runs)?
            .iter()
            .find(|r| r.id == run_id)
            .cloned()
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(lock(&self.runs)?.last().cloned())
    }

    fn update_run_status(&self, run_id: ExecutionId, status: RunStatus) -> StorageResult<()> {
        let mut runs = lock(&self.runs)?;
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(StorageError::RunNotFound(run_id))?;
        run.status = status;
        Ok(())
    }

    fn complete_run(&self, run_id: ExecutionId) -> StorageResult<()> {
        let mut runs = lock(&self.runs)?;
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(StorageError::RunNotFound(run_id))?;
        run.status = RunStatus::Completed;
        run.finished_at = Some(Utc::now().to_rfc3339());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE: &str = "PendingURLsDB";

    #[test]
    fn test_queue_orders_by_priority_then_insertion() {
        let queue = MemoryWorkQueue::new();
        queue
            .put(&WebUrl::new("https://b.com/").with_priority(1), QUEUE, 0, 1)
            .unwrap();
        queue.put(&WebUrl::new("https://a.com/"), QUEUE, 0, 1).unwrap();
        queue.put(&WebUrl::new("https://c.com/"), QUEUE, 0, 1).unwrap();

        let got: Vec<String> = queue
            .get(10, QUEUE, 0)
            .unwrap()
            .into_iter()
            .map(|u| u.url)
            .collect();
        assert_eq!(got, vec!["https://a.com/", "https://c.com/", "https://b.com/"]);
    }

    #[test]
    fn test_queue_delete_is_worker_scoped() {
        let queue = MemoryWorkQueue::new();
        queue.put(&WebUrl::new("https://a.com/"), QUEUE, 1, 1).unwrap();
        queue.put(&WebUrl::new("https://b.com/"), QUEUE, 2, 1).unwrap();

        assert_eq!(queue.delete(5, QUEUE, 1).unwrap(), 1);
        assert_eq!(queue.get_length(QUEUE).unwrap(), 1);
        assert_eq!(queue.get(5, QUEUE, 2).unwrap().len(), 1);
    }

    #[test]
    fn test_queue_clear_keeps_other_workers() {
        let queue = MemoryWorkQueue::new();
        queue.put(&WebUrl::new("https://a.com/"), QUEUE, 1, 1).unwrap();
        queue.put(&WebUrl::new("https://b.com/"), QUEUE, 1, 1).unwrap();
        queue.put(&WebUrl::new("https://c.com/"), QUEUE, 2, 1).unwrap();

        assert_eq!(queue.clear(QUEUE, 1).unwrap(), 2);
        assert_eq!(queue.get(5, QUEUE, 1).unwrap().len(), 0);
        assert_eq!(queue.get(5, QUEUE, 2).unwrap().len(), 1);
    }

    #[test]
    fn test_tracker_remove_missing_is_false() {
        let tracker = MemoryInFlightTracker::new();
        assert!(!tracker.remove_url(&WebUrl::new("https://a.com/"), 0).unwrap());
    }

    #[test]
    fn test_tracker_delete_oldest_first() {
        let tracker = MemoryInFlightTracker::new();
        for name in ["https://a.com/", "https://b.com/", "https://c.com/"] {
            tracker.put(&WebUrl::new(name), "db", 0, 1).unwrap();
        }

        assert_eq!(tracker.delete(2, "db", 0).unwrap(), 2);
        let rest = tracker.get(10, "db", 0).unwrap();
        assert_eq!(rest, vec![WebUrl::new("https://c.com/")]);
    }

    #[test]
    fn test_counters() {
        let counters = MemoryCounters::new();
        counters.increment("n", 3).unwrap();
        counters.increment("n", -1).unwrap();
        assert_eq!(counters.get_value("n").unwrap(), 2);
        assert_eq!(counters.get_value("other").unwrap(), 0);
    }

    #[test]
    fn test_runs() {
        let runs = MemoryRuns::new();
        let id = runs.create_run("hash").unwrap();
        runs.complete_run(id).unwrap();
        assert_eq!(runs.get_run(id).unwrap().status, RunStatus::Completed);
        assert!(runs.update_run_status(42, RunStatus::Failed).is_err());
    }
}
