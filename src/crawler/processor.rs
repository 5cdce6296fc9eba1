//! The seam where the fetch/parse pipeline plugs into the worker pool

use crate::url::WebUrl;
use std::io::Write;
use thiserror::Error;

/// Errors a page processor can report for one URL
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to process {url}: {message}")]
    Failed { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Processes one dispatched URL and returns the links discovered on it
///
/// Implementations run on blocking worker threads and may take as long as
/// they need. Returned links are scheduled one level below the processed
/// URL; their depth and parent are overwritten by the controller.
pub trait PageProcessor: Send + Sync {
    fn process(&self, url: &WebUrl) -> Result<Vec<WebUrl>, ProcessError>;
}

/// Hands every dispatched URL to an external fetcher by printing it, one per line
#[derive(Debug, Default)]
pub struct DispatchProcessor;

impl PageProcessor for DispatchProcessor {
    fn process(&self, url: &WebUrl) -> Result<Vec<WebUrl>, ProcessError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", url.url)?;
        Ok(Vec::new())
    }
}
