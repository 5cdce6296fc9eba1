//! Crawl-Frontier: a durable, budgeted crawl frontier
//!
//! This crate decides which discovered URLs are dispatched next to fetcher
//! workers under a global page budget, survives process crashes by replaying
//! in-flight URLs, and lets several worker processes share one set of
//! durable stores partitioned by worker id.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod output;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Frontier initialization failed: {0}")]
    Initialization(String),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for frontier operations
pub type Result<T> = std::result::Result<T, FrontierError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Identifies which worker process owns queue and in-flight entries
pub type WorkerId = u32;

/// Identifies the crawl run that stamped an entry
pub type ExecutionId = i64;

// Re-export commonly used types
pub use config::Config;
pub use frontier::Frontier;
pub use url::WebUrl;
