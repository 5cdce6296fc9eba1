//! Crawl controller - drives a pool of workers against one frontier
//!
//! This module contains the worker loop and the completion monitor:
//! - workers pull batches, hand each URL to the page processor, schedule the
//!   links it discovers and acknowledge the URL
//! - the monitor finishes the frontier once the queue is empty and every
//!   worker has stayed idle for a grace period, or as soon as no worker is
//!   left running

use crate::config::CrawlerConfig;
use crate::crawler::processor::PageProcessor;
use crate::frontier::Frontier;
use crate::url::WebUrl;
use crate::FrontierError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a completed crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlReport {
    /// URLs the processor handled successfully
    pub pages_processed: u64,

    /// URLs the processor reported as failed (still acknowledged)
    pub pages_failed: u64,

    pub elapsed: Duration,
}

#[derive(Default)]
struct WorkerActivity {
    live: AtomicUsize,
    busy: AtomicUsize,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Marks a worker busy for as long as it holds a batch, even if the processor panics
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Counts a worker as live until its task ends, however it ends
struct LiveWorker(Arc<WorkerActivity>);

impl LiveWorker {
    fn register(activity: &Arc<WorkerActivity>) -> Self {
        activity.live.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(activity))
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Main crawl controller structure
pub struct Controller {
    frontier: Arc<Frontier>,
    config: CrawlerConfig,
    activity: Arc<WorkerActivity>,
}

impl Controller {
    pub fn new(frontier: Arc<Frontier>, config: CrawlerConfig) -> Self {
        Self {
            frontier,
            config,
            activity: Arc::new(WorkerActivity::default()),
        }
    }

    /// The frontier this controller drives; call `finish()` on it to stop the crawl
    pub fn shutdown_handle(&self) -> Arc<Frontier> {
        Arc::clone(&self.frontier)
    }

    /// Runs the crawl until the frontier is finished
    ///
    /// Spawns the configured number of blocking workers, monitors them until
    /// the crawl is quiescent (or someone else finishes the frontier), then
    /// waits for every worker to drain its batch and exit.
    pub async fn run(&self, processor: Arc<dyn PageProcessor>) -> Result<CrawlReport, FrontierError> {
        let start = Instant::now();
        tracing::info!(
            "Starting {} workers for worker id {}",
            self.config.number_of_workers,
            self.frontier.worker_id()
        );

        let workers: Vec<_> = (0..self.config.number_of_workers)
            .map(|index| {
                let frontier = Arc::clone(&self.frontier);
                let processor = Arc::clone(&processor);
                let live = LiveWorker::register(&self.activity);
                let config = self.config.clone();
                tokio::task::spawn_blocking(move || {
                    worker_loop(index, &frontier, processor.as_ref(), &live.0, &config)
                })
            })
            .collect();

        self.monitor(start).await;

        let mut failure = None;
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task failed: {}", e);
                failure.get_or_insert_with(|| e.to_string());
            }
        }
        if let Some(message) = failure {
            return Err(FrontierError::Worker(message));
        }

        let report = CrawlReport {
            pages_processed: self.activity.processed.load(Ordering::Acquire),
            pages_failed: self.activity.failed.load(Ordering::Acquire),
            elapsed: start.elapsed(),
        };

        tracing::info!(
            "Crawl completed: {} pages processed, {} failed in {:?}",
            report.pages_processed,
            report.pages_failed,
            report.elapsed
        );

        Ok(report)
    }

    /// Finishes the frontier once the crawl stays quiescent for the grace period
    async fn monitor(&self, start: Instant) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.monitor_interval_ms));
        let grace = Duration::from_millis(self.config.idle_grace_ms);

        loop {
            interval.tick().await;
            if self.frontier.is_finished() {
                return;
            }

            if self.activity.live.load(Ordering::Acquire) == 0 {
                tracing::warn!("All workers exited, finishing crawl");
                self.frontier.finish();
                return;
            }

            let done = self.activity.processed.load(Ordering::Acquire)
                + self.activity.failed.load(Ordering::Acquire);
            tracing::debug!(
                "Progress: {} pages handled, {} workers busy, {:.2} pages/sec",
                done,
                self.activity.busy.load(Ordering::Acquire),
                done as f64 / start.elapsed().as_secs_f64().max(f64::EPSILON)
            );

            if !self.is_quiescent() {
                continue;
            }

            // A worker may have popped the last batch but not yet marked itself busy
            tokio::time::sleep(grace).await;
            if self.frontier.is_finished() {
                return;
            }
            if self.is_quiescent() {
                tracing::info!("No pending URLs and all workers idle, finishing crawl");
                self.frontier.finish();
                return;
            }
        }
    }

    fn is_quiescent(&self) -> bool {
        if self.activity.busy.load(Ordering::Acquire) > 0 {
            return false;
        }

        match self.frontier.queue_length() {
            Ok(length) => length == 0,
            Err(e) => {
                tracing::warn!("Could not read queue length: {}", e);
                false
            }
        }
    }
}

fn worker_loop(
    index: u32,
    frontier: &Frontier,
    processor: &dyn PageProcessor,
    activity: &WorkerActivity,
    config: &CrawlerConfig,
) {
    tracing::debug!("Worker {} started", index);

    loop {
        let batch = frontier.get_next_urls(config.batch_size);
        if batch.is_empty() {
            tracing::debug!("Worker {} exiting, frontier finished", index);
            return;
        }

        let _busy = BusyGuard::enter(&activity.busy);
        for url in &batch {
            match processor.process(url) {
                Ok(links) => {
                    let children = child_links(url, links, config);
                    if !children.is_empty() {
                        let admitted = frontier.schedule_all(&children);
                        tracing::trace!(
                            "Scheduled {} of {} links from {}",
                            admitted,
                            children.len(),
                            url
                        );
                    }
                    activity.processed.fetch_add(1, Ordering::AcqRel);
                }
                Err(e) => {
                    tracing::warn!("Worker {} failed on {}: {}", index, url, e);
                    activity.failed.fetch_add(1, Ordering::AcqRel);
                }
            }

            frontier.set_processed(url);
        }
    }
}

/// Stamps discovered links as children of `parent` and drops those past the depth limit
fn child_links(parent: &WebUrl, links: Vec<WebUrl>, config: &CrawlerConfig) -> Vec<WebUrl> {
    let depth = parent.depth.saturating_add(1);
    if !config.allows_depth(depth) {
        return Vec::new();
    }

    links
        .into_iter()
        .map(|mut link| {
            link.depth = depth;
            link.parent_url = Some(parent.url.clone());
            link
        })
        .collect()
}
