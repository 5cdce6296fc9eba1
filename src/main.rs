//! Crawl-Frontier main entry point
//!
//! This is the command-line interface that drains a durable crawl frontier,
//! printing every dispatched URL for an external fetcher.

use anyhow::Context;
use clap::Parser;
use crawl_frontier::config::{load_config_with_hash, Config, StorageBackend};
use crawl_frontier::crawler::{run_crawl, DispatchProcessor};
use crawl_frontier::url::WebUrl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Crawl-Frontier: a durable, budgeted crawl frontier
///
/// Dispatches pending URLs to workers under a global page budget and replays
/// URLs that were in flight when a previous run crashed. Dispatched URLs are
/// written to stdout, one per line; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "crawl-frontier")]
#[command(version = "1.0.0")]
#[command(about = "A durable, budgeted crawl frontier", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Additional seed URLs to schedule at startup
    #[arg(long = "seed", value_name = "URL", num_args = 1..)]
    seeds: Vec<String>,

    /// File with additional seed URLs, one per line
    #[arg(long, value_name = "PATH")]
    seed_file: Option<PathBuf>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show frontier statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context("invalid configuration");
        }
    };

    let extra_seeds = collect_extra_seeds(&cli.seeds, cli.seed_file.as_deref())?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &extra_seeds);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, extra_seeds).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_frontier=info,warn"),
            1 => EnvFilter::new("crawl_frontier=debug,info"),
            2 => EnvFilter::new("crawl_frontier=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries dispatched URLs
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Parses seeds given on the command line and in the optional seed file
fn collect_extra_seeds(seeds: &[String], seed_file: Option<&Path>) -> anyhow::Result<Vec<WebUrl>> {
    let mut raw: Vec<String> = seeds.to_vec();

    if let Some(path) = seed_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        raw.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }

    raw.iter()
        .map(|seed| WebUrl::parse(seed).with_context(|| format!("invalid seed URL {}", seed)))
        .collect()
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, extra_seeds: &[WebUrl]) {
    println!("=== Crawl-Frontier Dry Run ===\n");

    println!("Frontier Configuration:");
    if config.frontier.is_unbounded() {
        println!("  Max pages to fetch: unlimited");
    } else {
        println!("  Max pages to fetch: {}", config.frontier.max_pages_to_fetch);
    }
    println!("  Resumable crawling: {}", config.frontier.resumable_crawling);
    println!("  Worker id: {}", config.frontier.worker_id);
    println!(
        "  Reschedule batch size: {}",
        config.frontier.reschedule_batch_size
    );

    println!("\nCrawler Configuration:");
    println!("  Workers: {}", config.crawler.number_of_workers);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Monitor interval: {}ms", config.crawler.monitor_interval_ms);
    println!("  Idle grace: {}ms", config.crawler.idle_grace_ms);

    println!("\nStorage:");
    match config.storage.backend {
        StorageBackend::Sqlite => println!("  SQLite database: {}", config.storage.database_path),
        StorageBackend::Memory => println!("  In-memory (lost on exit)"),
    }

    println!(
        "\nSeeds ({}):",
        config.seeds.len() + extra_seeds.len()
    );
    for seed in &config.seeds {
        println!("  - {}", seed);
    }
    for seed in extra_seeds {
        println!("  - {} (command line)", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use crawl_frontier::output::{load_statistics, print_statistics};
    use crawl_frontier::storage::{open_run_registry, open_stores};

    if config.storage.backend == StorageBackend::Memory {
        println!("In-memory storage keeps no state between runs; nothing to report");
        return Ok(());
    }

    println!("Database: {}\n", config.storage.database_path);

    let stores = open_stores(&config.storage, true).context("failed to open stores")?;
    let runs = open_run_registry(&config.storage).context("failed to open run registry")?;

    let stats = load_statistics(&stores, runs.as_ref())?;
    print_statistics(&stats);

    stores.close()?;
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    extra_seeds: Vec<WebUrl>,
) -> anyhow::Result<()> {
    if config.frontier.resumable_crawling {
        tracing::info!("Starting crawl (will replay URLs left in flight by a previous run)");
    } else {
        tracing::info!("Starting non-resumable crawl");
    }

    tracing::info!(
        "Workers: {}, batch size: {}, configured seeds: {}, extra seeds: {}",
        config.crawler.number_of_workers,
        config.crawler.batch_size,
        config.seeds.len(),
        extra_seeds.len()
    );

    // Run the crawler
    match run_crawl(config, config_hash, extra_seeds, Arc::new(DispatchProcessor)).await {
        Ok(report) => {
            tracing::info!(
                "Crawl completed successfully: {} dispatched, {} failed",
                report.pages_processed,
                report.pages_failed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
