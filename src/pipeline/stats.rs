//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters updated as files move through the pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub files_seen: AtomicU64,
    pub imported: AtomicU64,
    pub duplicates: AtomicU64,
    pub stale_events: AtomicU64,
    pub failures: AtomicU64,
}

impl PipelineStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            imported: self.imported.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub files_seen: u64,
    pub imported: u64,
    pub duplicates: u64,
    pub stale_events: u64,
    pub failures: u64,
}

/// Outcome of the startup catch-up pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUpSummary {
    /// Matching files found in the tree.
    pub found: usize,
    /// Files generated, parsed and stored.
    pub imported: usize,
    /// Files whose checksum was already in the ledger, or which vanished.
    pub skipped: usize,
    /// Files that failed and will be retried on the next start.
    pub failed: usize,
}
