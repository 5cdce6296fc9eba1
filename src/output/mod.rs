//! Output module for reporting frontier state
//!
//! This module handles:
//! - Loading queue, tracker and counter statistics from the stores
//! - Printing them together with the latest run record

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, FrontierStatistics};
