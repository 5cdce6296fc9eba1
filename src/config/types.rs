use serde::Deserialize;

/// Default number of in-flight URLs re-admitted per recovery batch
pub const DEFAULT_RESCHEDULE_BATCH_SIZE: usize = 100;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub frontier: FrontierConfig,
    pub crawler: CrawlerConfig,
    pub storage: StorageConfig,
    /// Seed URLs scheduled when the crawl starts
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Admission and recovery settings for the frontier
#[derive(Debug, Clone, Deserialize)]
pub struct FrontierConfig {
    /// Global cap on URLs ever scheduled; zero or negative means unlimited
    #[serde(rename = "max-pages-to-fetch")]
    pub max_pages_to_fetch: i64,

    /// Track in-flight URLs and replay them after a crash
    #[serde(rename = "resumable-crawling")]
    pub resumable_crawling: bool,

    /// Worker id this process serves when several processes share the stores
    #[serde(rename = "worker-id", default)]
    pub worker_id: u32,

    /// Number of in-flight URLs replayed per batch during recovery
    #[serde(
        rename = "reschedule-batch-size",
        default = "default_reschedule_batch_size"
    )]
    pub reschedule_batch_size: usize,
}

impl FrontierConfig {
    /// Returns true if the admission budget is unlimited
    pub fn is_unbounded(&self) -> bool {
        self.max_pages_to_fetch <= 0
    }
}

/// Worker pool settings for the crawl controller
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of worker threads pulling from the frontier
    #[serde(rename = "number-of-workers")]
    pub number_of_workers: u32,

    /// Maximum URLs a worker pulls per dequeue
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Maximum link depth to schedule; negative means unlimited
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: i32,

    /// How often the completion monitor checks for quiescence (milliseconds)
    #[serde(rename = "monitor-interval-ms", default = "default_monitor_interval")]
    pub monitor_interval_ms: u64,

    /// How long the crawl must stay quiescent before it is finished (milliseconds)
    #[serde(rename = "idle-grace-ms", default = "default_idle_grace")]
    pub idle_grace_ms: u64,
}

impl CrawlerConfig {
    /// Returns true if a URL at `depth` may be scheduled
    pub fn allows_depth(&self, depth: u16) -> bool {
        self.max_depth < 0 || i32::from(depth) <= self.max_depth
    }
}

/// Which implementation backs the three durable stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage location configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file shared by all worker processes
    #[serde(rename = "database-path", default)]
    pub database_path: String,
}

fn default_reschedule_batch_size() -> usize {
    DEFAULT_RESCHEDULE_BATCH_SIZE
}

fn default_max_depth() -> i32 {
    -1
}

fn default_monitor_interval() -> u64 {
    1000
}

fn default_idle_grace() -> u64 {
    2000
}
