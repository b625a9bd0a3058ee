//! Ingestion pipeline.
//!
//! This module provides:
//! - Content checksums used as deduplication keys
//! - The coordinator that moves files from the event queue into storage
//! - Pipeline counters

mod checksum;
mod coordinator;
mod stats;

pub use checksum::file_checksum;
pub use coordinator::{Coordinator, PipelineConfig, ProcessOutcome};
pub use stats::{CatchUpSummary, PipelineStats, PipelineStatsSnapshot};
