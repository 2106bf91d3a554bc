//! Per-pass sync summaries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    /// Relative path or key of the entry.
    pub path: String,
    /// Error message.
    pub message: String,
}

/// Counters collected during a push or pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Files uploaded.
    pub uploaded: usize,
    /// Directory markers written.
    pub markers_written: usize,
    /// Files downloaded.
    pub downloaded: usize,
    /// Files skipped because the local copy was current.
    pub up_to_date: usize,
    /// Local directories wiped and recreated.
    pub directories_recreated: usize,
    /// Entries ignored (symlinks, foreign or unsafe keys, corrupt markers).
    pub skipped: usize,
    /// Total file bytes moved in either direction.
    pub bytes_transferred: u64,
    /// Entries that failed.
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Returns true if no entry failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record_failure(&mut self, path: impl Into<String>, err: impl fmt::Display) {
        self.failures.push(SyncFailure {
            path: path.into(),
            message: err.to_string(),
        });
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} markers, {} downloaded, {} up to date, {} directories recreated, {} skipped, {} failed",
            self.uploaded,
            self.markers_written,
            self.downloaded,
            self.up_to_date,
            self.directories_recreated,
            self.skipped,
            self.failures.len()
        )
    }
}
