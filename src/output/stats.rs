//! Statistics read back from the frontier's stores
//!
//! This module provides functionality for extracting and displaying
//! the state of a crawl from the storage layer, without building a frontier.

use crate::storage::{
    FrontierStores, RunRecord, RunRegistry, IN_PROCESS_PAGES_DB, PENDING_URLS_DB,
    PROCESSED_PAGES_COUNTER, SCHEDULED_PAGES_COUNTER,
};
use crate::FrontierError;

/// Frontier statistics summary
#[derive(Debug, Clone)]
pub struct FrontierStatistics {
    /// Pending URLs across all workers
    pub queue_length: u64,

    /// URLs dispatched but not acknowledged; `None` when no tracker is open
    pub in_flight: Option<u64>,

    /// URLs ever admitted, as persisted
    pub scheduled_pages: i64,

    /// Acknowledgements ever recorded
    pub processed_pages: i64,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl FrontierStatistics {
    /// Admitted pages not yet acknowledged, clamped at zero
    pub fn outstanding_pages(&self) -> i64 {
        (self.scheduled_pages - self.processed_pages).max(0)
    }
}

/// Loads statistics from the stores
///
/// # Arguments
///
/// * `stores` - The stores to query
/// * `runs` - The run registry holding run history
///
/// # Returns
///
/// * `Ok(FrontierStatistics)` - Successfully loaded statistics
/// * `Err(FrontierError)` - Failed to query a store
pub fn load_statistics(
    stores: &FrontierStores,
    runs: &dyn RunRegistry,
) -> Result<FrontierStatistics, FrontierError> {
    let queue_length = stores.work_queue.get_length(PENDING_URLS_DB)?;

    let in_flight = match stores.in_flight.as_deref() {
        Some(tracker) => Some(tracker.get_length(IN_PROCESS_PAGES_DB)?),
        None => None,
    };

    let scheduled_pages = stores.counters.get_value(SCHEDULED_PAGES_COUNTER)?;
    let processed_pages = stores.counters.get_value(PROCESSED_PAGES_COUNTER)?;
    let latest_run = runs.get_latest_run()?;

    Ok(FrontierStatistics {
        queue_length,
        in_flight,
        scheduled_pages,
        processed_pages,
        latest_run,
    })
}

/// Wall-clock duration of a finished run in seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run
        .started_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &FrontierStatistics) {
    println!("=== Frontier Statistics ===\n");

    println!("Pages:");
    println!("  Scheduled: {}", stats.scheduled_pages);
    println!("  Processed: {}", stats.processed_pages);
    println!("  Outstanding: {}", stats.outstanding_pages());
    println!();

    println!("Queues:");
    println!("  Pending: {}", stats.queue_length);
    match stats.in_flight {
        Some(count) => println!("  In flight: {}", count),
        None => println!("  In flight: (not tracked)"),
    }
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = run_duration_seconds(run) {
                println!("  Duration: {}s", seconds);
            }
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No crawl runs recorded"),
    }

    let completion = if stats.scheduled_pages > 0 {
        (stats.processed_pages as f64 / stats.scheduled_pages as f64) * 100.0
    } else {
        0.0
    };
    println!();
    println!(
        "Completion: {:.1}% ({} / {} scheduled pages processed)",
        completion, stats.processed_pages, stats.scheduled_pages
    );
}
