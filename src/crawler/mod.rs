//! Crawler module driving worker pools against the frontier
//!
//! This module contains:
//! - The page processor seam and the stdout dispatch processor
//! - The crawl controller (worker pool and completion monitor)
//! - The top-level crawl entry point used by the binary

mod controller;
mod processor;

pub use controller::{Controller, CrawlReport};
pub use processor::{DispatchProcessor, PageProcessor, ProcessError};

use crate::config::Config;
use crate::frontier::Frontier;
use crate::storage::{open_run_registry, open_stores, RunStatus};
use crate::url::WebUrl;
use crate::{ExecutionId, FrontierError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Register a crawl run, whose id becomes the execution id
/// 2. Open the stores and build the frontier (replaying leftovers if resumable)
/// 3. Schedule the seeds
/// 4. Drive the worker pool until the crawl is quiescent or interrupted
/// 5. Record the run outcome and close the stores
///
/// Seeds from the configuration are skipped when the stores already record
/// scheduled pages, so a resumed crawl does not re-admit them. `extra_seeds`
/// are always scheduled.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `extra_seeds` - Additional seeds supplied at startup
/// * `processor` - Handles every dispatched URL
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished or was interrupted cleanly
/// * `Err(FrontierError)` - Crawl failed
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    extra_seeds: Vec<WebUrl>,
    processor: Arc<dyn PageProcessor>,
) -> Result<CrawlReport, FrontierError> {
    let runs = open_run_registry(&config.storage)?;
    let execution_id = runs.create_run(config_hash)?;
    tracing::info!("Starting crawl run {}", execution_id);

    let interrupted = Arc::new(AtomicBool::new(false));
    let outcome = drive(
        &config,
        execution_id,
        extra_seeds,
        processor,
        Arc::clone(&interrupted),
    )
    .await;

    let recorded = match &outcome {
        Ok(_) if interrupted.load(Ordering::Acquire) => {
            runs.update_run_status(execution_id, RunStatus::Interrupted)
        }
        Ok(_) => runs.complete_run(execution_id),
        Err(e) => {
            tracing::error!("Crawl run {} failed: {}", execution_id, e);
            runs.update_run_status(execution_id, RunStatus::Failed)
        }
    };
    if let Err(e) = recorded {
        tracing::warn!("Could not record outcome of run {}: {}", execution_id, e);
    }

    outcome
}

async fn drive(
    config: &Config,
    execution_id: ExecutionId,
    extra_seeds: Vec<WebUrl>,
    processor: Arc<dyn PageProcessor>,
    interrupted: Arc<AtomicBool>,
) -> Result<CrawlReport, FrontierError> {
    let stores = open_stores(&config.storage, config.frontier.resumable_crawling)?;
    let frontier = Arc::new(Frontier::new(&config.frontier, stores, execution_id)?);

    let seeds = collect_seeds(config, &frontier, extra_seeds)?;
    if !seeds.is_empty() {
        let admitted = frontier.schedule_all(&seeds);
        tracing::info!("Scheduled {} of {} seed URLs", admitted, seeds.len());
    }

    let controller = Controller::new(Arc::clone(&frontier), config.crawler.clone());
    let handle = controller.shutdown_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing crawl");
            interrupted.store(true, Ordering::Release);
            handle.finish();
        }
    });

    let report = controller.run(processor).await;

    interrupt.abort();
    // Cancelled is the expected outcome; awaiting makes sure the task released its handle
    let _ = interrupt.await;
    drop(controller);

    let frontier = Arc::try_unwrap(frontier).map_err(|_| {
        FrontierError::Worker("frontier still referenced after workers exited".to_string())
    })?;
    frontier.close()?;

    report
}

fn collect_seeds(
    config: &Config,
    frontier: &Frontier,
    extra_seeds: Vec<WebUrl>,
) -> Result<Vec<WebUrl>, FrontierError> {
    let mut seeds = Vec::new();

    if frontier.scheduled_pages() == 0 {
        for seed in &config.seeds {
            seeds.push(WebUrl::parse(seed)?);
        }
    } else if !config.seeds.is_empty() {
        tracing::info!(
            "Resuming with {} pages already scheduled, skipping configured seeds",
            frontier.scheduled_pages()
        );
    }

    seeds.extend(extra_seeds);
    Ok(seeds)
}
