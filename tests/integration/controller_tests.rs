//! Integration tests for the crawl controller
//!
//! These tests drive worker pools with in-process page processors that
//! serve a fixed link graph, so the full dispatch cycle runs without a network.

use crawl_frontier::config::{
    Config, CrawlerConfig, FrontierConfig, StorageBackend, StorageConfig,
};
use crawl_frontier::crawler::{run_crawl, Controller, PageProcessor, ProcessError};
use crawl_frontier::frontier::Frontier;
use crawl_frontier::output::load_statistics;
use crawl_frontier::storage::{open_run_registry, open_stores, FrontierStores, RunStatus};
use crawl_frontier::url::WebUrl;
use crawl_frontier::FrontierError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves a static link graph and records every visit
struct GraphProcessor {
    links: HashMap<String, Vec<String>>,
    visits: Mutex<Vec<WebUrl>>,
    failing: Vec<String>,
}

impl GraphProcessor {
    /// Each edge maps a page to its space-separated outgoing links
    fn new(edges: &[(&str, &str)]) -> Self {
        let links = edges
            .iter()
            .map(|(from, to)| {
                (
                    page(from),
                    to.split_whitespace().map(page).collect::<Vec<_>>(),
                )
            })
            .collect();
        Self {
            links,
            visits: Mutex::new(Vec::new()),
            failing: Vec::new(),
        }
    }

    fn failing_on(mut self, name: &str) -> Self {
        self.failing.push(page(name));
        self
    }

    fn visited(&self) -> Vec<WebUrl> {
        self.visits.lock().unwrap().clone()
    }
}

impl PageProcessor for GraphProcessor {
    fn process(&self, url: &WebUrl) -> Result<Vec<WebUrl>, ProcessError> {
        self.visits.lock().unwrap().push(url.clone());

        if self.failing.contains(&url.url) {
            return Err(ProcessError::Failed {
                url: url.url.clone(),
                message: "connection reset".to_string(),
            });
        }

        Ok(self
            .links
            .get(&url.url)
            .map(|targets| targets.iter().map(WebUrl::new).collect())
            .unwrap_or_default())
    }
}

/// Discovers a fresh link on every page, so the crawl never runs dry
#[derive(Default)]
struct EndlessProcessor {
    next: AtomicU64,
}

impl PageProcessor for EndlessProcessor {
    fn process(&self, _url: &WebUrl) -> Result<Vec<WebUrl>, ProcessError> {
        std::thread::sleep(Duration::from_millis(2));
        let n = self.next.fetch_add(1, Ordering::AcqRel);
        Ok(vec![WebUrl::new(page(&format!("endless/{}", n)))])
    }
}

/// Panics on every page it is handed
struct PanickingProcessor;

impl PageProcessor for PanickingProcessor {
    fn process(&self, url: &WebUrl) -> Result<Vec<WebUrl>, ProcessError> {
        panic!("processor crashed on {}", url);
    }
}

fn page(name: &str) -> String {
    format!("https://example.com/{}", name)
}

fn crawler_config(max_depth: i32) -> CrawlerConfig {
    CrawlerConfig {
        number_of_workers: 3,
        batch_size: 2,
        max_depth,
        monitor_interval_ms: 10,
        idle_grace_ms: 30,
    }
}

fn memory_frontier(max_pages: i64) -> Arc<Frontier> {
    let config = FrontierConfig {
        max_pages_to_fetch: max_pages,
        resumable_crawling: false,
        worker_id: 0,
        reschedule_batch_size: 100,
    };
    Arc::new(Frontier::new(&config, FrontierStores::in_memory(false), 1).unwrap())
}

fn sorted_urls(urls: &[WebUrl]) -> Vec<String> {
    let mut names: Vec<String> = urls.iter().map(|u| u.url.clone()).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_crawl_visits_every_reachable_page_once() {
    let frontier = memory_frontier(0);
    frontier.schedule(&WebUrl::new(page("")));

    let processor = Arc::new(GraphProcessor::new(&[
        ("", "a b"),
        ("a", "c"),
        ("b", "d e"),
    ]));
    let controller = Controller::new(Arc::clone(&frontier), crawler_config(-1));

    let report = controller
        .run(Arc::clone(&processor) as Arc<dyn PageProcessor>)
        .await
        .unwrap();

    assert_eq!(report.pages_processed, 6);
    assert_eq!(report.pages_failed, 0);
    assert!(frontier.is_finished());
    assert_eq!(frontier.number_of_processed_pages().unwrap(), 6);
    assert_eq!(
        sorted_urls(&processor.visited()),
        vec![page(""), page("a"), page("b"), page("c"), page("d"), page("e")]
    );

    let visits = processor.visited();
    let c = visits.iter().find(|u| u.url == page("c")).unwrap();
    assert_eq!(c.depth, 2);
    assert_eq!(c.parent_url.as_deref(), Some(page("a").as_str()));
}

#[tokio::test]
async fn test_crawl_stops_at_max_depth() {
    let frontier = memory_frontier(0);
    frontier.schedule(&WebUrl::new(page("")));

    let processor = Arc::new(GraphProcessor::new(&[
        ("", "a"),
        ("a", "b"),
        ("b", "c"),
    ]));
    let controller = Controller::new(Arc::clone(&frontier), crawler_config(1));

    let report = controller
        .run(Arc::clone(&processor) as Arc<dyn PageProcessor>)
        .await
        .unwrap();

    assert_eq!(report.pages_processed, 2);
    assert_eq!(sorted_urls(&processor.visited()), vec![page(""), page("a")]);
}

#[tokio::test]
async fn test_crawl_respects_page_budget() {
    let frontier = memory_frontier(3);
    frontier.schedule(&WebUrl::new(page("")));

    let processor = Arc::new(GraphProcessor::new(&[("", "a b c d")]));
    let controller = Controller::new(Arc::clone(&frontier), crawler_config(-1));

    let report = controller
        .run(Arc::clone(&processor) as Arc<dyn PageProcessor>)
        .await
        .unwrap();

    assert_eq!(report.pages_processed, 3);
    assert_eq!(frontier.scheduled_pages(), 3);
    assert_eq!(sorted_urls(&processor.visited()), vec![page(""), page("a"), page("b")]);
}

#[tokio::test]
async fn test_failed_pages_are_still_acknowledged() {
    let frontier = memory_frontier(0);
    frontier.schedule(&WebUrl::new(page("")));

    let processor = Arc::new(GraphProcessor::new(&[("", "a b")]).failing_on("a"));
    let controller = Controller::new(Arc::clone(&frontier), crawler_config(-1));

    let report = controller
        .run(Arc::clone(&processor) as Arc<dyn PageProcessor>)
        .await
        .unwrap();

    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.pages_failed, 1);
    assert_eq!(frontier.number_of_processed_pages().unwrap(), 3);
}

#[tokio::test]
async fn test_shutdown_handle_stops_endless_crawl() {
    let frontier = memory_frontier(0);
    frontier.schedule(&WebUrl::new(page("")));

    let controller = Controller::new(Arc::clone(&frontier), crawler_config(-1));
    let handle = controller.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.finish();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        controller.run(Arc::new(EndlessProcessor::default())),
    )
    .await
    .expect("crawl did not stop after finish")
    .unwrap();

    assert!(frontier.is_finished());
    assert!(report.pages_processed > 0);
}

#[tokio::test]
async fn test_crawl_ends_when_every_worker_panics() {
    let frontier = memory_frontier(0);
    // Three workers take at most two URLs each before dying, so the queue never drains
    let seeds: Vec<WebUrl> = (0..10)
        .map(|i| WebUrl::new(page(&format!("p{}", i))))
        .collect();
    assert_eq!(frontier.schedule_all(&seeds), 10);

    let controller = Controller::new(Arc::clone(&frontier), crawler_config(-1));
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        controller.run(Arc::new(PanickingProcessor)),
    )
    .await
    .expect("crawl hung after all workers exited");

    assert!(matches!(result, Err(FrontierError::Worker(_))));
    assert!(frontier.is_finished());
    assert!(frontier.queue_length().unwrap() > 0);
}

#[tokio::test]
async fn test_run_crawl_records_completed_run() {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        backend: StorageBackend::Sqlite,
        database_path: dir
            .path()
            .join("frontier.db")
            .to_string_lossy()
            .into_owned(),
    };
    let config = Config {
        frontier: FrontierConfig {
            max_pages_to_fetch: 0,
            resumable_crawling: true,
            worker_id: 1,
            reschedule_batch_size: 100,
        },
        crawler: crawler_config(-1),
        storage: storage.clone(),
        seeds: vec![page("")],
    };

    let processor = Arc::new(GraphProcessor::new(&[("", "a"), ("a", "b")]));
    let report = run_crawl(
        config,
        "hash",
        vec![WebUrl::new(page("extra"))],
        Arc::clone(&processor) as Arc<dyn PageProcessor>,
    )
    .await
    .unwrap();

    assert_eq!(report.pages_processed, 4);

    let runs = open_run_registry(&storage).unwrap();
    let run = runs.get_latest_run().unwrap().expect("run recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash");

    let stores = open_stores(&storage, true).unwrap();
    let stats = load_statistics(&stores, runs.as_ref()).unwrap();
    assert_eq!(stats.queue_length, 0);
    assert_eq!(stats.in_flight, Some(0));
    assert_eq!(stats.scheduled_pages, 4);
    assert_eq!(stats.processed_pages, 4);
    stores.close().unwrap();
}
