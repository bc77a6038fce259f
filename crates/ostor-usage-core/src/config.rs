//! Run configuration
//!
//! [`CollectorConfig`] is built once at startup (from the CLI) and handed to
//! the collector. Nothing in the crates reads configuration from globals.

use crate::error::{Result, UsageError};
use std::path::{Path, PathBuf};

/// Default guard window in seconds
pub const DEFAULT_USAGE_PERIOD_SECS: u64 = 3600;

/// Default number of usage objects fetched at the same time
pub const DEFAULT_CONCURRENCY: usize = 12;

/// File name of the canonical summary
pub const SUMMARY_FILE_NAME: &str = "summarized_data.json";

/// Where a run writes its documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Canonical summary, overwritten every run
    pub summary_file: PathBuf,
    /// Directory for timestamped copies of the summary
    pub results_dir: PathBuf,
    /// Directory for raw per-object chunks
    pub chunks_dir: PathBuf,
    /// Directory for timestamped summary backups
    pub backup_dir: PathBuf,
}

impl OutputPaths {
    /// Standard layout below `root`
    ///
    /// ```text
    /// root/results/summarized_data.json
    /// root/results/summarized_data_<ts>.json
    /// root/results/stats/chunks/<object>.json
    /// root/backups/usage_summary_<ts>.json
    /// ```
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let results_dir = root.join("results");
        Self {
            summary_file: results_dir.join(SUMMARY_FILE_NAME),
            chunks_dir: results_dir.join("stats").join("chunks"),
            backup_dir: root.join("backups"),
            results_dir,
        }
    }

    /// Replace the canonical summary path
    pub fn with_summary_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_file = path.into();
        self
    }
}

/// Settings for one collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Guard window in seconds
    pub usage_period_secs: u64,
    /// Maximum number of concurrent fetches (and deletions)
    pub concurrency: usize,
    /// Delete processed usage objects from the remote store after the summary is built
    pub remove_items: bool,
    /// Persist every fetched usage object as a chunk file
    pub save_chunks: bool,
    /// Output locations
    pub paths: OutputPaths,
}

impl CollectorConfig {
    /// Configuration with default settings writing below `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            usage_period_secs: DEFAULT_USAGE_PERIOD_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            remove_items: false,
            save_chunks: false,
            paths: OutputPaths::under(root),
        }
    }

    /// Set the guard window
    pub fn with_usage_period(mut self, secs: u64) -> Self {
        self.usage_period_secs = secs;
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enable or disable deletion of processed objects
    pub fn with_remove_items(mut self, remove_items: bool) -> Self {
        self.remove_items = remove_items;
        self
    }

    /// Enable or disable chunk persistence
    pub fn with_save_chunks(mut self, save_chunks: bool) -> Self {
        self.save_chunks = save_chunks;
        self
    }

    /// Check the settings make sense
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Config`] if the concurrency limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(UsageError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
