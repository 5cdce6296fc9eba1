//! The crawl frontier
//!
//! The [`Frontier`] decides which pending URLs are dispatched next. It owns
//! handles to three durable collaborators (work queue, in-flight tracker and
//! counter store) and coordinates them under two synchronization domains:
//!
//! - the scheduling lock, held for every check-then-act admission and every
//!   pop-then-track dequeue;
//! - a separate wake-up signal that blocked dequeuers wait on after
//!   releasing the scheduling lock.
//!
//! # Counter semantics
//!
//! `scheduled-pages` counts only URLs whose queue write succeeded. A failed
//! write is skipped and never counted.
//!
//! Crash recovery subtracts the number of URLs left in flight from the
//! loaded counter and relies on re-admission to add them back. If the
//! process dies mid-replay, the counter under-counts until the next start
//! finishes the replay. The crawl guarantee is at-least-once.
//!
//! A non-resumable frontier starts from nothing: it discards this worker's
//! pending URLs and resets both reserved counters left by earlier runs.

mod signal;

use crate::config::FrontierConfig;
use crate::storage::{
    FrontierStores, IN_PROCESS_PAGES_DB, PENDING_URLS_DB, PROCESSED_PAGES_COUNTER,
    SCHEDULED_PAGES_COUNTER,
};
use crate::url::WebUrl;
use crate::{ExecutionId, FrontierError, Result, WorkerId};
use signal::WakeSignal;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Coordinates admission, dispatch and acknowledgement of crawl URLs
pub struct Frontier {
    stores: FrontierStores,
    max_pages_to_fetch: i64,
    worker_id: WorkerId,
    execution_id: ExecutionId,

    /// Scheduling lock; guards every mutation of `scheduled_pages` and every
    /// read-and-pop of the work queue
    scheduling: Mutex<()>,
    scheduled_pages: AtomicI64,

    wakeup: WakeSignal,
    finished: AtomicBool,
}

impl Frontier {
    /// Builds a frontier for one worker process and crawl run
    ///
    /// When resumable crawling is enabled, URLs left in the in-flight tracker
    /// by a previous run of this worker are re-admitted before this returns.
    /// Otherwise the pending queue and counters are wiped for a fresh start.
    ///
    /// # Arguments
    ///
    /// * `config` - Budget, resumability, worker id and replay batch size
    /// * `stores` - The durable collaborators; the tracker must be present
    ///   for resumable crawls and is released otherwise
    /// * `execution_id` - The crawl run stamped onto every entry
    ///
    /// # Returns
    ///
    /// * `Ok(Frontier)` - Ready to serve scheduling and dequeue calls
    /// * `Err(FrontierError)` - The stores could not be read; the crawl run
    ///   must be aborted
    pub fn new(
        config: &FrontierConfig,
        mut stores: FrontierStores,
        execution_id: ExecutionId,
    ) -> Result<Self> {
        if config.resumable_crawling && stores.in_flight.is_none() {
            return Err(FrontierError::Initialization(
                "resumable crawling requires an in-flight tracker".to_string(),
            ));
        }

        if !config.resumable_crawling {
            if let Some(tracker) = stores.in_flight.take() {
                tracing::debug!("Releasing in-flight tracker for non-resumable crawl");
                tracker.close()?;
            }
        }

        let frontier = Self {
            stores,
            max_pages_to_fetch: config.max_pages_to_fetch,
            worker_id: config.worker_id,
            execution_id,
            scheduling: Mutex::new(()),
            scheduled_pages: AtomicI64::new(0),
            wakeup: WakeSignal::default(),
            finished: AtomicBool::new(false),
        };

        if config.resumable_crawling {
            frontier.recover(config.reschedule_batch_size)?;
        } else {
            frontier.start_fresh()?;
        }

        tracing::info!(
            "Frontier ready for worker {} (execution {}, {} pages scheduled so far)",
            frontier.worker_id,
            frontier.execution_id,
            frontier.scheduled_pages()
        );

        Ok(frontier)
    }

    /// Replays URLs left in flight by a previous run of this worker
    fn recover(&self, batch_size: usize) -> Result<()> {
        let Some(tracker) = self.stores.in_flight.as_deref() else {
            return Ok(());
        };

        let mut scheduled = self.stores.counters.get_value(SCHEDULED_PAGES_COUNTER)?;
        let leftover = tracker.get_worker_length(IN_PROCESS_PAGES_DB, self.worker_id)?;

        if leftover > 0 {
            tracing::info!("Rescheduling {} URLs from previous crawl", leftover);
            scheduled -= leftover as i64;
        }
        self.scheduled_pages.store(scheduled, Ordering::Release);

        if leftover == 0 {
            return Ok(());
        }

        let mut replayed = 0usize;
        loop {
            let batch = tracker.get(batch_size, IN_PROCESS_PAGES_DB, self.worker_id)?;
            if batch.is_empty() {
                break;
            }

            let admitted = {
                let _guard = self.lock_scheduling();
                self.admit(&batch)
            };
            if admitted < batch.len() {
                tracing::warn!(
                    "Dropped {} in-flight URLs during replay (budget reached or write failed)",
                    batch.len() - admitted
                );
            }
            replayed += admitted;

            // Delete only after re-admission so a crash here replays this batch again
            let deleted = tracker.delete(batch.len(), IN_PROCESS_PAGES_DB, self.worker_id)?;
            if deleted == 0 {
                return Err(FrontierError::Initialization(
                    "in-flight tracker did not remove replayed entries".to_string(),
                ));
            }
        }

        tracing::info!("Replayed {} of {} in-flight URLs", replayed, leftover);
        Ok(())
    }

    /// Drops what a previous run left in the pending queue and counters
    fn start_fresh(&self) -> Result<()> {
        let stale = self
            .stores
            .work_queue
            .clear(PENDING_URLS_DB, self.worker_id)?;
        if stale > 0 {
            tracing::info!("Discarded {} pending URLs left by a previous run", stale);
        }

        self.stores.counters.reset(SCHEDULED_PAGES_COUNTER)?;
        self.stores.counters.reset(PROCESSED_PAGES_COUNTER)?;
        Ok(())
    }

    fn lock_scheduling(&self) -> MutexGuard<'_, ()> {
        self.scheduling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn budget_allows(&self, scheduled: i64) -> bool {
        self.max_pages_to_fetch <= 0 || scheduled < self.max_pages_to_fetch
    }

    /// Writes as many of `urls` as the budget allows; the caller holds the scheduling lock
    fn admit(&self, urls: &[WebUrl]) -> usize {
        let scheduled = self.scheduled_pages.load(Ordering::Acquire);
        let mut admitted = 0usize;

        for (index, url) in urls.iter().enumerate() {
            if !self.budget_allows(scheduled + admitted as i64) {
                tracing::debug!(
                    "Page budget of {} reached, dropping {} URLs",
                    self.max_pages_to_fetch,
                    urls.len() - index
                );
                break;
            }

            match self.stores.work_queue.put(
                url,
                PENDING_URLS_DB,
                self.worker_id,
                self.execution_id,
            ) {
                Ok(()) => admitted += 1,
                Err(e) => {
                    tracing::error!("Error while putting {} in the work queue: {}", url, e)
                }
            }
        }

        if admitted > 0 {
            self.scheduled_pages
                .store(scheduled + admitted as i64, Ordering::Release);
            if let Err(e) = self
                .stores
                .counters
                .increment(SCHEDULED_PAGES_COUNTER, admitted as i64)
            {
                tracing::error!("Failed to persist scheduled page count: {}", e);
            }
        }

        self.wakeup.notify_all();
        admitted
    }

    /// Admits a batch of URLs, returning how many were written
    ///
    /// Admission stops at the first URL that would exceed the page budget;
    /// the rest of the batch is dropped. A URL whose write fails is logged
    /// and skipped without stopping the batch.
    pub fn schedule_all(&self, urls: &[WebUrl]) -> usize {
        let _guard = self.lock_scheduling();
        self.admit(urls)
    }

    /// Admits a single URL, returning whether it was written
    pub fn schedule(&self, url: &WebUrl) -> bool {
        self.schedule_all(std::slice::from_ref(url)) == 1
    }

    /// Pops up to `max` URLs for this worker; the caller holds the scheduling lock
    fn pop_batch(&self, max: usize) -> Vec<WebUrl> {
        let queue = &self.stores.work_queue;

        let urls = match queue.get(max, PENDING_URLS_DB, self.worker_id) {
            Ok(urls) => urls,
            Err(e) => {
                tracing::error!("Error while getting next URLs: {}", e);
                return Vec::new();
            }
        };
        if urls.is_empty() {
            return urls;
        }

        match queue.delete(urls.len(), PENDING_URLS_DB, self.worker_id) {
            Ok(deleted) if deleted != urls.len() => {
                tracing::warn!(
                    "Work queue removed {} entries after returning {}",
                    deleted,
                    urls.len()
                );
            }
            Ok(_) => {}
            Err(e) => {
                // The entries are still queued; hand nothing out rather than dispatch twice
                tracing::error!("Error while removing dispatched URLs: {}", e);
                return Vec::new();
            }
        }

        if let Some(tracker) = self.stores.in_flight.as_deref() {
            for url in &urls {
                if let Err(e) =
                    tracker.put(url, IN_PROCESS_PAGES_DB, self.worker_id, self.execution_id)
                {
                    tracing::error!("Failed to record {} as in flight: {}", url, e);
                }
            }
        }

        urls
    }

    /// Returns up to `max` pending URLs, blocking while none are available
    ///
    /// Returns an empty batch once the frontier is finished (or immediately
    /// when `max` is zero). A URL returned here is never returned again by
    /// this frontier unless it is scheduled anew.
    pub fn get_next_urls(&self, max: usize) -> Vec<WebUrl> {
        if max == 0 {
            return Vec::new();
        }

        loop {
            let seen = {
                let _guard = self.lock_scheduling();
                if self.is_finished() {
                    return Vec::new();
                }

                let urls = self.pop_batch(max);
                if !urls.is_empty() {
                    return urls;
                }

                self.wakeup.generation()
            };

            self.wakeup.wait_past(seen, &self.finished);
            if self.is_finished() {
                return Vec::new();
            }
        }
    }

    /// Acknowledges that a dispatched URL has been processed
    ///
    /// Every call increments `processed-pages`, so duplicate acknowledgements
    /// are counted twice. A URL missing from the in-flight tracker is logged
    /// as a warning.
    pub fn set_processed(&self, url: &WebUrl) {
        if let Err(e) = self.stores.counters.increment(PROCESSED_PAGES_COUNTER, 1) {
            tracing::error!("Failed to persist processed page count: {}", e);
        }

        if let Some(tracker) = self.stores.in_flight.as_deref() {
            match tracker.remove_url(url, self.worker_id) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("Could not remove {} from the list of in-flight pages", url)
                }
                Err(e) => tracing::error!("Failed to remove {} from in-flight pages: {}", url, e),
            }
        }
    }

    /// Requests shutdown and wakes every blocked dequeuer
    pub fn finish(&self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            tracing::info!("Frontier finished for worker {}", self.worker_id);
        }
        self.wakeup.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Number of pending URLs across all workers
    pub fn queue_length(&self) -> Result<u64> {
        Ok(self.stores.work_queue.get_length(PENDING_URLS_DB)?)
    }

    /// Number of URLs dispatched but not yet acknowledged (0 when not resumable)
    pub fn number_of_assigned_pages(&self) -> Result<u64> {
        match self.stores.in_flight.as_deref() {
            Some(tracker) => Ok(tracker.get_length(IN_PROCESS_PAGES_DB)?),
            None => Ok(0),
        }
    }

    /// Number of acknowledgements ever recorded
    pub fn number_of_processed_pages(&self) -> Result<i64> {
        Ok(self.stores.counters.get_value(PROCESSED_PAGES_COUNTER)?)
    }

    /// This process's view of the number of URLs ever scheduled
    pub fn scheduled_pages(&self) -> i64 {
        self.scheduled_pages.load(Ordering::Acquire)
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn is_resumable(&self) -> bool {
        self.stores.in_flight.is_some()
    }

    /// Releases the storage handles
    ///
    /// Taking `self` guarantees no scheduling or dequeue call can still be
    /// running. Does not imply [`finish`](Self::finish).
    pub fn close(self) -> Result<()> {
        tracing::debug!("Closing frontier stores for worker {}", self.worker_id);
        self.stores.close()?;
        Ok(())
    }
}
