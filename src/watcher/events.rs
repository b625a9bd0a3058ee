//! File system event types.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was created.
    Created,
    /// File content changed.
    Changed,
    /// File was renamed or moved into place.
    Renamed,
}

/// A change notification for one file.
///
/// Carries no identity beyond the path. The same change may be reported
/// more than once, and the file may be gone by the time the event is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Full path of the file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FileEventKind,
}

impl FileEvent {
    /// Create an event.
    pub fn new(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Shorthand for a creation event.
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileEventKind::Created)
    }

    /// Shorthand for a rename event.
    pub fn renamed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileEventKind::Renamed)
    }

    /// Path of the affected file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
