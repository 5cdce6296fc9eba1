//! SQLite storage implementation
//!
//! Each store owns its own connection to the shared database file, mirroring
//! how separate worker processes open the same file. WAL mode plus a busy
//! timeout lets those processes interleave their writes.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    CounterStore, InFlightTracker, RunRegistry, StorageError, StorageResult, WorkQueue,
};
use crate::storage::{RunRecord, RunStatus};
use crate::url::WebUrl;
use crate::{ExecutionId, WorkerId};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a connection waits on another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A single connection guarded for use from many threads
struct SqliteHandle {
    conn: Mutex<Connection>,
}

impl SqliteHandle {
    fn open(path: &Path) -> StorageResult<Self> {
        Self::from_connection(init_database(path)?)
    }

    #[cfg(test)]
    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }

    fn close(self) -> StorageResult<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))?;
        conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

/// Reads the URL columns shared by `work_queue` and `in_flight`
///
/// Expects `url, depth, parent_url, anchor, priority` in that order.
fn read_web_url(row: &Row<'_>) -> rusqlite::Result<WebUrl> {
    Ok(WebUrl {
        url: row.get(0)?,
        depth: row.get(1)?,
        parent_url: row.get(2)?,
        anchor: row.get(3)?,
        priority: row.get(4)?,
    })
}

fn to_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// SQLite-backed durable work queue
pub struct SqliteWorkQueue {
    handle: SqliteHandle,
}

impl SqliteWorkQueue {
    /// Opens (or creates) the work queue in the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open(path)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory()?,
        })
    }
}

impl WorkQueue for SqliteWorkQueue {
    fn put(
        &self,
        url: &WebUrl,
        queue_name: &str,
        worker_id: WorkerId,
        execution_id: ExecutionId,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.handle.lock()?.execute(
            "INSERT INTO work_queue
             (queue_name, worker_id, execution_id, url, depth, parent_url, anchor, priority, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                queue_name,
                worker_id,
                execution_id,
                url.url,
                url.depth,
                url.parent_url,
                url.anchor,
                url.priority,
                now
            ],
        )?;
        Ok(())
    }

    fn get(
        &self,
        max: usize,
        queue_name: &str,
        worker_id: WorkerId,
    ) -> StorageResult<Vec<WebUrl>> {
        let conn = self.handle.lock()?;
        let mut stmt = conn.prepare(
            "SELECT url, depth, parent_url, anchor, priority FROM work_queue
             WHERE queue_name = ?1 AND worker_id = ?2
             ORDER BY priority ASC, id ASC LIMIT ?3",
        )?;

        let urls = stmt
            .query_map(params![queue_name, worker_id, to_limit(max)], read_web_url)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    fn delete(&self, count: usize, queue_name: &str, worker_id: WorkerId) -> StorageResult<usize> {
        if count == 0 {
            return Ok(0);
        }

        let deleted = self.handle.lock()?.execute(
            "DELETE FROM work_queue WHERE id IN (
                SELECT id FROM work_queue
                WHERE queue_name = ?1 AND worker_id = ?2
                ORDER BY priority ASC, id ASC LIMIT ?3
             )",
            params![queue_name, worker_id, to_limit(count)],
        )?;
        Ok(deleted)
    }

    fn clear(&self, queue_name: &str, worker_id: WorkerId) -> StorageResult<usize> {
        let deleted = self.handle.lock()?.execute(
            "DELETE FROM work_queue WHERE queue_name = ?1 AND worker_id = ?2",
            params![queue_name, worker_id],
        )?;
        Ok(deleted)
    }

    fn get_length(&self, queue_name: &str) -> StorageResult<u64> {
        let count: i64 = self.handle.lock()?.query_row(
            "SELECT COUNT(*) FROM work_queue WHERE queue_name = ?1",
            params![queue_name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        self.handle.close()
    }
}

/// SQLite-backed in-flight tracker
pub struct SqliteInFlightTracker {
    handle: SqliteHandle,
}

impl SqliteInFlightTracker {
    /// Opens (or creates) the tracker in the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open(path)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory()?,
        })
    }
}

impl InFlightTracker for SqliteInFlightTracker {
    fn put(
        &self,
        url: &WebUrl,
        db_name: &str,
        worker_id: WorkerId,
        execution_id: ExecutionId,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.handle.lock()?.execute(
            "INSERT INTO in_flight
             (db_name, worker_id, execution_id, url, depth, parent_url, anchor, priority, dispatched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                db_name,
                worker_id,
                execution_id,
                url.url,
                url.depth,
                url.parent_url,
                url.anchor,
                url.priority,
                now
            ],
        )?;
        Ok(())
    }

    fn get(&self, max: usize, db_name: &str, worker_id: WorkerId) -> StorageResult<Vec<WebUrl>> {
        let conn = self.handle.lock()?;
        let mut stmt = conn.prepare(
            "SELECT url, depth, parent_url, anchor, priority FROM in_flight
             WHERE db_name = ?1 AND worker_id = ?2
             ORDER BY id ASC LIMIT ?3",
        )?;

        let urls = stmt
            .query_map(params![db_name, worker_id, to_limit(max)], read_web_url)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    fn delete(&self, count: usize, db_name: &str, worker_id: WorkerId) -> StorageResult<usize> {
        if count == 0 {
            return Ok(0);
        }

        let deleted = self.handle.lock()?.execute(
            "DELETE FROM in_flight WHERE id IN (
                SELECT id FROM in_flight
                WHERE db_name = ?1 AND worker_id = ?2
                ORDER BY id ASC LIMIT ?3
             )",
            params![db_name, worker_id, to_limit(count)],
        )?;
        Ok(deleted)
    }

    fn remove_url(&self, url: &WebUrl, worker_id: WorkerId) -> StorageResult<bool> {
        let deleted = self.handle.lock()?.execute(
            "DELETE FROM in_flight WHERE id = (
                SELECT id FROM in_flight WHERE url = ?1 AND worker_id = ?2
                ORDER BY id ASC LIMIT 1
             )",
            params![url.url, worker_id],
        )?;
        Ok(deleted > 0)
    }

    fn get_length(&self, db_name: &str) -> StorageResult<u64> {
        let count: i64 = self.handle.lock()?.query_row(
            "SELECT COUNT(*) FROM in_flight WHERE db_name = ?1",
            params![db_name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_worker_length(&self, db_name: &str, worker_id: WorkerId) -> StorageResult<u64> {
        let count: i64 = self.handle.lock()?.query_row(
            "SELECT COUNT(*) FROM in_flight WHERE db_name = ?1 AND worker_id = ?2",
            params![db_name, worker_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        self.handle.close()
    }
}

/// SQLite-backed named counters
pub struct SqliteCounters {
    handle: SqliteHandle,
}

impl SqliteCounters {
    /// Opens (or creates) the counters in the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open(path)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory()?,
        })
    }
}

impl CounterStore for SqliteCounters {
    fn get_value(&self, name: &str) -> StorageResult<i64> {
        let value: Option<i64> = self
            .handle
            .lock()?
            .query_row(
                "SELECT value FROM counters WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0))
    }

    fn increment(&self, name: &str, delta: i64) -> StorageResult<()> {
        // A single upsert keeps the increment atomic across processes
        self.handle.lock()?.execute(
            "INSERT INTO counters (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = value + excluded.value",
            params![name, delta],
        )?;
        Ok(())
    }

    fn reset(&self, name: &str) -> StorageResult<()> {
        self.handle
            .lock()?
            .execute("DELETE FROM counters WHERE name = ?1", params![name])?;
        Ok(())
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        self.handle.close()
    }
}

/// SQLite-backed run registry
pub struct SqliteRuns {
    handle: SqliteHandle,
}

impl SqliteRuns {
    /// Opens (or creates) the run registry in the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open(path)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            handle: SqliteHandle::open_in_memory()?,
        })
    }
}

fn read_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl RunRegistry for SqliteRuns {
    fn create_run(&self, config_hash: &str) -> StorageResult<ExecutionId> {
        let now = Utc::now().to_rfc3339();
        let conn = self.handle.lock()?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: ExecutionId) -> StorageResult<RunRecord> {
        self.handle
            .lock()?
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                read_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .handle
            .lock()?
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs
                 ORDER BY id DESC LIMIT 1",
                [],
                read_run,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&self, run_id: ExecutionId, status: RunStatus) -> StorageResult<()> {
        let updated = self.handle.lock()?.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&self, run_id: ExecutionId) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.handle.lock()?.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

/// Initializes or opens a database at the given path
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
