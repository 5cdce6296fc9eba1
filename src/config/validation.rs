use crate::config::types::{
    Config, CrawlerConfig, FrontierConfig, StorageBackend, StorageConfig,
};
use crate::url::WebUrl;
use crate::ConfigError;

const MAX_RESCHEDULE_BATCH_SIZE: usize = 10_000;
const MAX_WORKERS: u32 = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_frontier_config(&config.frontier)?;
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(&config.storage)?;
    validate_resumable_backend(&config.frontier, &config.storage)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.reschedule_batch_size < 1 || config.reschedule_batch_size > MAX_RESCHEDULE_BATCH_SIZE
    {
        return Err(ConfigError::Validation(format!(
            "reschedule_batch_size must be between 1 and {}, got {}",
            MAX_RESCHEDULE_BATCH_SIZE, config.reschedule_batch_size
        )));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.number_of_workers < 1 || config.number_of_workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "number_of_workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.number_of_workers
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.monitor_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "monitor_interval_ms must be >= 10ms, got {}ms",
            config.monitor_interval_ms
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.backend == StorageBackend::Sqlite && config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty for the sqlite backend".to_string(),
        ));
    }

    Ok(())
}

/// Resumable crawling only makes sense when the stores outlive the process
fn validate_resumable_backend(
    frontier: &FrontierConfig,
    storage: &StorageConfig,
) -> Result<(), ConfigError> {
    if frontier.resumable_crawling && storage.backend == StorageBackend::Memory {
        return Err(ConfigError::Validation(
            "resumable_crawling requires the sqlite backend".to_string(),
        ));
    }

    Ok(())
}

fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        WebUrl::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
    }

    Ok(())
}
