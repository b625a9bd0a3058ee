//! File system watcher using notify-rs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::events::{FileEvent, FileEventKind};
use super::filter::FileFilter;
use super::queue::EventPublisher;
use crate::error::WatcherError;
use crate::Result;

/// File watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to watch.
    pub root: PathBuf,
    /// File name filter.
    pub filter: FileFilter,
    /// Watch subdirectories too.
    pub recursive: bool,
    /// Also publish content changes, not just creations and renames.
    pub include_changes: bool,
}

/// Counters for the notification callback.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub events_published: AtomicU64,
    pub events_ignored: AtomicU64,
    pub errors: AtomicU64,
}

impl WatcherStats {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub events_published: u64,
    pub events_ignored: u64,
    pub errors: u64,
}

/// Live watch on a directory tree.
///
/// Notifications are translated and pushed onto the event queue from the
/// notify thread; nothing on that path waits on the consumer.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
    stats: Arc<WatcherStats>,
}

impl FileWatcher {
    /// Start watching `config.root`, publishing matching events.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or cannot be watched.
    pub fn start(config: &WatcherConfig, publisher: EventPublisher) -> Result<Self> {
        let root = config.root.clone();
        if !root.is_dir() {
            return Err(WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        let stats = WatcherStats::new();
        let callback_stats = Arc::clone(&stats);
        let filter = config.filter.clone();
        let include_changes = config.include_changes;

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    let events = classify(&event, &filter, include_changes);
                    if events.is_empty() {
                        callback_stats.events_ignored.fetch_add(1, Ordering::Relaxed);
                    }
                    for file_event in events {
                        tracing::trace!(path = %file_event.path.display(), kind = ?file_event.kind, "Queued file event");
                        if publisher.publish(file_event) {
                            callback_stats.events_published.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Err(e) => {
                    callback_stats.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Watch error: {:?}", e);
                }
            }
        })
        .map_err(|e| WatcherError::WatchFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

        let mode = if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        watcher
            .watch(&root, mode)
            .map_err(|e| WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            path = %root.display(),
            pattern = config.filter.pattern(),
            recursive = config.recursive,
            "Watching directory"
        );

        Ok(Self {
            watcher,
            root,
            stats,
        })
    }

    /// Watched root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Callback counters.
    #[must_use]
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Stop watching. No further events are published.
    ///
    /// # Errors
    ///
    /// Returns an error if unwatching fails.
    pub fn stop(mut self) -> Result<()> {
        self.watcher
            .unwatch(&self.root)
            .map_err(|e| WatcherError::WatchFailed {
                path: self.root.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %self.root.display(), "Stopped watching directory");
        Ok(())
    }
}

/// Translate a notify event into the file events worth queueing.
fn classify(event: &Event, filter: &FileFilter, include_changes: bool) -> Vec<FileEvent> {
    let (kind, paths): (FileEventKind, &[PathBuf]) = match event.kind {
        EventKind::Create(CreateKind::Folder) => return Vec::new(),
        EventKind::Create(_) => (FileEventKind::Created, event.paths.as_slice()),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return Vec::new(),
        // paths are [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (FileEventKind::Renamed, event.paths.last().map_or(&[][..], std::slice::from_ref))
        }
        EventKind::Modify(ModifyKind::Name(_)) => (FileEventKind::Renamed, event.paths.as_slice()),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) if include_changes => {
            (FileEventKind::Changed, event.paths.as_slice())
        }
        _ => return Vec::new(),
    };

    paths
        .iter()
        .filter(|p| filter.matches(p))
        .map(|p| FileEvent::new(p.clone(), kind))
        .collect()
}
