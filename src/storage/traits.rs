//! Storage traits and error types
//!
//! This module defines the contracts the frontier requires from its three
//! durable collaborators, plus the run registry used to mint execution ids.
//! Every store is shared between threads, so methods take `&self` and
//! implementations carry their own interior locking.

use crate::storage::{RunRecord, RunStatus};
use crate::url::WebUrl;
use crate::{ExecutionId, WorkerId};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Store is unavailable: {0}")]
    Unavailable(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store of pending URLs, partitioned by queue name and worker id
///
/// Entries come back from [`get`](WorkQueue::get) in dispatch order (lower
/// priority first, then insertion order). A `get` followed by a `delete` of
/// the same count for the same worker removes exactly the entries returned.
pub trait WorkQueue: Send + Sync {
    /// Appends a URL owned by `worker_id`, stamped with the run that scheduled it
    fn put(
        &self,
        url: &WebUrl,
        queue_name: &str,
        worker_id: WorkerId,
        execution_id: ExecutionId,
    ) -> StorageResult<()>;

    /// Returns up to `max` entries for `worker_id` without removing them
    fn get(&self, max: usize, queue_name: &str, worker_id: WorkerId)
        -> StorageResult<Vec<WebUrl>>;

    /// Removes the first `count` entries for `worker_id`, returning how many went
    fn delete(&self, count: usize, queue_name: &str, worker_id: WorkerId) -> StorageResult<usize>;

    /// Removes every entry owned by `worker_id`, returning how many went
    fn clear(&self, queue_name: &str, worker_id: WorkerId) -> StorageResult<usize>;

    /// Counts all entries in the queue across workers
    fn get_length(&self, queue_name: &str) -> StorageResult<u64>;

    /// Releases the underlying handle
    fn close(self: Box<Self>) -> StorageResult<()>;
}

/// Durable record of URLs handed to a worker but not yet acknowledged
pub trait InFlightTracker: Send + Sync {
    /// Records a URL as in flight for `worker_id`
    fn put(
        &self,
        url: &WebUrl,
        db_name: &str,
        worker_id: WorkerId,
        execution_id: ExecutionId,
    ) -> StorageResult<()>;

    /// Returns up to `max` in-flight entries for `worker_id`, oldest first
    fn get(&self, max: usize, db_name: &str, worker_id: WorkerId) -> StorageResult<Vec<WebUrl>>;

    /// Removes the oldest `count` entries for `worker_id`
    fn delete(&self, count: usize, db_name: &str, worker_id: WorkerId) -> StorageResult<usize>;

    /// Removes one entry for `url` owned by `worker_id`
    ///
    /// Returns `Ok(false)` when no such entry exists; absence is not an error.
    fn remove_url(&self, url: &WebUrl, worker_id: WorkerId) -> StorageResult<bool>;

    /// Counts all in-flight entries across workers
    fn get_length(&self, db_name: &str) -> StorageResult<u64>;

    /// Counts in-flight entries owned by `worker_id`
    fn get_worker_length(&self, db_name: &str, worker_id: WorkerId) -> StorageResult<u64>;

    /// Releases the underlying handle
    fn close(self: Box<Self>) -> StorageResult<()>;
}

/// Durable named counters; an absent counter reads as zero
pub trait CounterStore: Send + Sync {
    fn get_value(&self, name: &str) -> StorageResult<i64>;

    fn increment(&self, name: &str, delta: i64) -> StorageResult<()>;

    /// Sets a counter back to zero
    fn reset(&self, name: &str) -> StorageResult<()>;

    /// Releases the underlying handle
    fn close(self: Box<Self>) -> StorageResult<()>;
}

/// Registry of crawl runs; the run id doubles as the execution id
pub trait RunRegistry: Send + Sync {
    /// Creates a new running crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&self, config_hash: &str) -> StorageResult<ExecutionId>;

    /// Gets a run by ID
    fn get_run(&self, run_id: ExecutionId) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&self, run_id: ExecutionId, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&self, run_id: ExecutionId) -> StorageResult<()>;
}
