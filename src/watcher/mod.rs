//! File system watching.
//!
//! This module provides:
//! - Directory watching using notify-rs
//! - Glob filtering on file names
//! - The pending event queue drained by the pipeline
//! - Directory enumeration for the startup catch-up pass

mod events;
mod filter;
mod queue;
mod scanner;
#[allow(clippy::module_inception)]
mod watcher;

pub use events::{FileEvent, FileEventKind};
pub use filter::{FileFilter, DEFAULT_PATTERN};
pub use queue::{EventPublisher, EventQueue};
pub use scanner::{scan_directory, ScanResult};
pub use watcher::{FileWatcher, WatcherConfig, WatcherStats, WatcherStatsSnapshot};
