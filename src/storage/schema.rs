//! Database schema definitions
//!
//! All frontier stores live in one SQLite file so cooperating worker
//! processes can share it. Each store opens its own connection and runs
//! the (idempotent) schema on open.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs; the run id is the execution id stamped on entries
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Pending URLs waiting to be dispatched
CREATE TABLE IF NOT EXISTS work_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue_name TEXT NOT NULL,
    worker_id INTEGER NOT NULL,
    execution_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    parent_url TEXT,
    anchor TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_work_queue_dispatch
    ON work_queue(queue_name, worker_id, priority, id);

-- URLs handed to a worker and not yet acknowledged
CREATE TABLE IF NOT EXISTS in_flight (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    db_name TEXT NOT NULL,
    worker_id INTEGER NOT NULL,
    execution_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    parent_url TEXT,
    anchor TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    dispatched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_in_flight_worker ON in_flight(db_name, worker_id, id);
CREATE INDEX IF NOT EXISTS idx_in_flight_url ON in_flight(url, worker_id);

-- Named counters
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
