//! Durable JSON document persistence
//!
//! Every document is pretty-printed into a sibling `.tmp` file and renamed
//! into place, so readers of the canonical summary never observe a partial
//! write.

use crate::config::OutputPaths;
use crate::error::Result;
use crate::types::{ObjectName, UsageSummary};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Format of the timestamp in summary copy and backup file names
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Write `document` as pretty JSON to `path`, replacing it atomically
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, document: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(document)?;
    bytes.push(b'\n');

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, &bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Which summary files a save produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryWriteReport {
    /// Files written successfully
    pub written: Vec<PathBuf>,
    /// Files that failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

impl SummaryWriteReport {
    /// Whether every target was written
    pub fn all_written(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes summaries and chunks to their configured locations
#[derive(Debug, Clone)]
pub struct DocumentStore {
    paths: OutputPaths,
}

impl DocumentStore {
    /// Create a store for the given layout
    pub fn new(paths: OutputPaths) -> Self {
        Self { paths }
    }

    /// The configured layout
    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    /// Create every output directory that does not exist yet
    pub async fn ensure_directories(&self) -> Result<()> {
        let summary_dir = self.paths.summary_file.parent().map(Path::to_path_buf);
        let dirs = [
            Some(self.paths.results_dir.clone()),
            Some(self.paths.chunks_dir.clone()),
            Some(self.paths.backup_dir.clone()),
            summary_dir,
        ];
        for dir in dirs.into_iter().flatten() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Targets a summary saved at `at` is written to
    ///
    /// Canonical file first, then the timestamped results copy, then the backup.
    pub fn summary_targets(&self, at: DateTime<Local>) -> [PathBuf; 3] {
        let ts = at.format(FILE_TIMESTAMP_FORMAT);
        [
            self.paths.summary_file.clone(),
            self.paths
                .results_dir
                .join(format!("summarized_data_{ts}.json")),
            self.paths.backup_dir.join(format!("usage_summary_{ts}.json")),
        ]
    }

    /// Save a summary to all three targets
    ///
    /// Every target is attempted; a failure is logged and does not stop or
    /// undo the others.
    pub async fn save_summary(&self, summary: &UsageSummary, at: DateTime<Local>) -> SummaryWriteReport {
        let mut report = SummaryWriteReport::default();

        for target in self.summary_targets(at) {
            match write_json(&target, summary).await {
                Ok(()) => report.written.push(target),
                Err(e) => {
                    error!("Failed to save usage summary to '{}': {}", target.display(), e);
                    report.failed.push((target, e.to_string()));
                }
            }
        }

        if !report.written.is_empty() {
            info!(
                "Saved usage summary to {} of 3 locations (main='{}')",
                report.written.len(),
                self.paths.summary_file.display()
            );
        }
        report
    }

    /// Path the chunk of `object` is written to
    ///
    /// Path separators in the name are replaced so the chunk always lands
    /// directly in the chunk directory.
    pub fn chunk_path(&self, object: &ObjectName) -> PathBuf {
        let file_name: String = object
            .as_str()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.paths.chunks_dir.join(format!("{file_name}.json"))
    }

    /// Save the raw document of one usage object
    pub async fn save_chunk(&self, object: &ObjectName, document: &serde_json::Value) -> Result<PathBuf> {
        let path = self.chunk_path(object);
        write_json(&path, document).await?;
        info!("Saved stats for object '{}' to {}", object, path.display());
        Ok(path)
    }
}
