//! Integration tests for the frontier
//!
//! These tests run the frontier against SQLite databases in temporary
//! directories and restart it between phases to exercise crash recovery.

use crawl_frontier::config::{FrontierConfig, StorageBackend, StorageConfig};
use crawl_frontier::frontier::Frontier;
use crawl_frontier::storage::{open_run_registry, open_stores, RunStatus};
use crawl_frontier::url::WebUrl;
use std::collections::HashSet;
use std::path::Path;

fn storage_config(db_path: &Path) -> StorageConfig {
    StorageConfig {
        backend: StorageBackend::Sqlite,
        database_path: db_path.to_string_lossy().into_owned(),
    }
}

fn frontier_config(max_pages: i64, worker_id: u32) -> FrontierConfig {
    FrontierConfig {
        max_pages_to_fetch: max_pages,
        resumable_crawling: true,
        worker_id,
        reschedule_batch_size: 2,
    }
}

/// Opens a resumable frontier on the database, as a fresh process would
fn open_frontier(db_path: &Path, max_pages: i64, worker_id: u32, execution_id: i64) -> Frontier {
    let stores = open_stores(&storage_config(db_path), true).expect("Failed to open stores");
    Frontier::new(&frontier_config(max_pages, worker_id), stores, execution_id)
        .expect("Failed to build frontier")
}

/// Opens a non-resumable frontier on the database
fn open_fresh_frontier(db_path: &Path, max_pages: i64, execution_id: i64) -> Frontier {
    let config = FrontierConfig {
        resumable_crawling: false,
        ..frontier_config(max_pages, 1)
    };
    let stores = open_stores(&storage_config(db_path), false).expect("Failed to open stores");
    Frontier::new(&config, stores, execution_id).expect("Failed to build frontier")
}

fn url(path: &str) -> WebUrl {
    WebUrl::new(format!("https://example.com/{}", path))
}

fn names(urls: &[WebUrl]) -> Vec<String> {
    urls.iter().map(|u| u.url.clone()).collect()
}

#[test]
fn test_budget_and_restart_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");

    // First run: budget of two admits A and B, drops C
    let frontier = open_frontier(&db, 2, 1, 1);
    assert_eq!(frontier.schedule_all(&[url("a"), url("b"), url("c")]), 2);
    assert_eq!(frontier.scheduled_pages(), 2);

    let batch = frontier.get_next_urls(10);
    assert_eq!(names(&batch), names(&[url("a"), url("b")]));
    assert_eq!(frontier.number_of_assigned_pages().unwrap(), 2);

    frontier.set_processed(&url("a"));
    assert_eq!(frontier.number_of_assigned_pages().unwrap(), 1);

    // Crash: B is never acknowledged
    drop(frontier);

    // Second run replays B without exceeding the budget
    let frontier = open_frontier(&db, 2, 1, 2);
    assert_eq!(frontier.scheduled_pages(), 2);
    assert_eq!(frontier.queue_length().unwrap(), 1);
    assert_eq!(frontier.number_of_assigned_pages().unwrap(), 0);
    assert!(!frontier.schedule(&url("c")));

    let batch = frontier.get_next_urls(10);
    assert_eq!(names(&batch), names(&[url("b")]));
    frontier.set_processed(&url("b"));

    assert_eq!(frontier.number_of_processed_pages().unwrap(), 2);
    frontier.close().unwrap();
}

#[test]
fn test_no_url_lost_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");
    let all: Vec<WebUrl> = (0..7).map(|i| url(&format!("page{}", i))).collect();

    let frontier = open_frontier(&db, 0, 1, 1);
    assert_eq!(frontier.schedule_all(&all), 7);

    let mut acknowledged = HashSet::new();
    let batch = frontier.get_next_urls(4);
    assert_eq!(batch.len(), 4);
    frontier.set_processed(&batch[0]);
    acknowledged.insert(batch[0].url.clone());
    drop(frontier);

    // Three in flight plus three pending come back; replay batch size is two
    let frontier = open_frontier(&db, 0, 1, 2);
    assert_eq!(frontier.queue_length().unwrap(), 6);
    assert_eq!(frontier.scheduled_pages(), 7);

    let mut drained = HashSet::new();
    while frontier.queue_length().unwrap() > 0 {
        for dispatched in frontier.get_next_urls(3) {
            frontier.set_processed(&dispatched);
            assert!(drained.insert(dispatched.url), "URL dispatched twice after restart");
        }
    }

    assert!(drained.is_disjoint(&acknowledged));
    let seen: HashSet<String> = drained.union(&acknowledged).cloned().collect();
    let expected: HashSet<String> = all.iter().map(|u| u.url.clone()).collect();
    assert_eq!(seen, expected);
    assert_eq!(frontier.number_of_assigned_pages().unwrap(), 0);
    frontier.close().unwrap();
}

#[test]
fn test_restart_after_clean_drain_replays_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");

    let frontier = open_frontier(&db, 0, 1, 1);
    frontier.schedule_all(&[url("a"), url("b")]);
    for dispatched in frontier.get_next_urls(10) {
        frontier.set_processed(&dispatched);
    }
    frontier.close().unwrap();

    let frontier = open_frontier(&db, 0, 1, 2);
    assert_eq!(frontier.scheduled_pages(), 2);
    assert_eq!(frontier.queue_length().unwrap(), 0);
    assert_eq!(frontier.number_of_processed_pages().unwrap(), 2);
    frontier.close().unwrap();
}

#[test]
fn test_non_resumable_restart_starts_from_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");

    // First run queues A and B, then stops before dispatching anything
    let frontier = open_fresh_frontier(&db, 2, 1);
    assert_eq!(frontier.schedule_all(&[url("a"), url("b")]), 2);
    frontier.close().unwrap();

    // Second run gets its own budget and never sees A or B
    let frontier = open_fresh_frontier(&db, 2, 2);
    assert_eq!(frontier.scheduled_pages(), 0);
    assert_eq!(frontier.queue_length().unwrap(), 0);
    assert_eq!(frontier.number_of_processed_pages().unwrap(), 0);

    assert_eq!(frontier.schedule_all(&[url("c"), url("d"), url("e")]), 2);
    let batch = frontier.get_next_urls(10);
    assert_eq!(names(&batch), names(&[url("c"), url("d")]));
    assert_eq!(frontier.queue_length().unwrap(), 0);
    frontier.close().unwrap();
}

#[test]
fn test_workers_sharing_a_database_stay_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");

    let first = open_frontier(&db, 0, 1, 1);
    let second = open_frontier(&db, 0, 2, 1);

    first.schedule_all(&[url("x"), url("y")]);
    second.schedule(&url("z"));
    assert_eq!(first.queue_length().unwrap(), 3);

    let batch = first.get_next_urls(10);
    assert_eq!(names(&batch), names(&[url("x"), url("y")]));

    let batch = second.get_next_urls(10);
    assert_eq!(names(&batch), names(&[url("z")]));

    // Worker 2 crashes with z in flight; worker 1 restarting must not replay it
    drop(second);
    for dispatched in &[url("x"), url("y")] {
        first.set_processed(dispatched);
    }
    first.close().unwrap();

    let first = open_frontier(&db, 0, 1, 2);
    assert_eq!(first.queue_length().unwrap(), 0);
    first.close().unwrap();

    let second = open_frontier(&db, 0, 2, 2);
    assert_eq!(second.queue_length().unwrap(), 1);
    assert_eq!(names(&second.get_next_urls(10)), names(&[url("z")]));
    second.close().unwrap();
}

#[test]
fn test_entries_carry_execution_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");

    let runs = open_run_registry(&storage_config(&db)).unwrap();
    let execution_id = runs.create_run("hash").unwrap();

    let frontier = open_frontier(&db, 0, 1, execution_id);
    assert_eq!(frontier.execution_id(), execution_id);

    let seed = WebUrl::new("https://example.com/")
        .with_anchor("home")
        .with_priority(3);
    let child = seed.child("https://example.com/about");
    frontier.schedule_all(&[seed, child]);

    let batch = frontier.get_next_urls(10);
    assert_eq!(batch.len(), 2);
    let restored_child = batch
        .iter()
        .find(|u| u.url == "https://example.com/about")
        .expect("child dispatched");
    assert_eq!(restored_child.depth, 1);
    assert_eq!(restored_child.parent_url.as_deref(), Some("https://example.com/"));
    assert_eq!(restored_child.priority, 3);
    frontier.close().unwrap();

    runs.complete_run(execution_id).unwrap();
    let run = runs.get_run(execution_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.finished_at.is_some());
}
