//! Storage module for the frontier's durable collaborators
//!
//! This module handles:
//! - The work queue, in-flight tracker and counter store contracts
//! - SQLite implementations shared by cooperating worker processes
//! - In-memory implementations for non-resumable crawls
//! - Run tracking, which mints execution ids

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::{MemoryCounters, MemoryInFlightTracker, MemoryRuns, MemoryWorkQueue};
pub use sqlite::{
    init_database, SqliteCounters, SqliteInFlightTracker, SqliteRuns, SqliteWorkQueue,
};
pub use traits::{
    CounterStore, InFlightTracker, RunRegistry, StorageError, StorageResult, WorkQueue,
};

use crate::config::{StorageBackend, StorageConfig};
use std::path::Path;

/// Queue name under which pending URLs are stored
pub const PENDING_URLS_DB: &str = "PendingURLsDB";

/// Database name under which in-flight URLs are tracked
pub const IN_PROCESS_PAGES_DB: &str = "InProcessPagesDB";

/// Reserved counter holding the number of URLs ever scheduled
pub const SCHEDULED_PAGES_COUNTER: &str = "scheduled-pages";

/// Reserved counter holding the number of URLs acknowledged as processed
pub const PROCESSED_PAGES_COUNTER: &str = "processed-pages";

/// The three collaborators a frontier is built from
pub struct FrontierStores {
    pub work_queue: Box<dyn WorkQueue>,
    /// Only opened for resumable crawls
    pub in_flight: Option<Box<dyn InFlightTracker>>,
    pub counters: Box<dyn CounterStore>,
}

impl FrontierStores {
    /// Builds a fresh set of in-memory stores
    pub fn in_memory(with_tracker: bool) -> Self {
        Self {
            work_queue: Box::new(MemoryWorkQueue::new()),
            in_flight: with_tracker
                .then(|| Box::new(MemoryInFlightTracker::new()) as Box<dyn InFlightTracker>),
            counters: Box::new(MemoryCounters::new()),
        }
    }

    /// Releases every handle, reporting the first failure after attempting all
    pub fn close(self) -> StorageResult<()> {
        let queue = self.work_queue.close();
        let counters = self.counters.close();
        let tracker = match self.in_flight {
            Some(tracker) => tracker.close(),
            None => Ok(()),
        };
        queue.and(counters).and(tracker)
    }
}

/// Opens the stores described by `config`
///
/// # Arguments
///
/// * `config` - Storage backend and location
/// * `with_tracker` - Whether to open the in-flight tracker
///
/// # Returns
///
/// * `Ok(FrontierStores)` - All requested handles opened
/// * `Err(StorageError)` - A store could not be opened
pub fn open_stores(config: &StorageConfig, with_tracker: bool) -> StorageResult<FrontierStores> {
    match config.backend {
        StorageBackend::Memory => Ok(FrontierStores::in_memory(with_tracker)),
        StorageBackend::Sqlite => {
            let path = Path::new(&config.database_path);
            let in_flight = if with_tracker {
                Some(Box::new(SqliteInFlightTracker::open(path)?) as Box<dyn InFlightTracker>)
            } else {
                None
            };

            Ok(FrontierStores {
                work_queue: Box::new(SqliteWorkQueue::open(path)?),
                in_flight,
                counters: Box::new(SqliteCounters::open(path)?),
            })
        }
    }
}

/// Opens the run registry described by `config`
pub fn open_run_registry(config: &StorageConfig) -> StorageResult<Box<dyn RunRegistry>> {
    match config.backend {
        StorageBackend::Memory => Ok(Box::new(MemoryRuns::new())),
        StorageBackend::Sqlite => Ok(Box::new(SqliteRuns::open(Path::new(
            &config.database_path,
        ))?)),
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
