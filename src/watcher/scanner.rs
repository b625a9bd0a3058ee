//! Directory enumeration for the startup catch-up pass.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::filter::FileFilter;
use crate::error::WatcherError;
use crate::Result;

/// Result of enumerating the watch tree.
#[derive(Debug, Default, Clone)]
pub struct ScanResult {
    /// Matching files in enumeration order.
    pub files: Vec<PathBuf>,
    /// Regular files that did not match the filter.
    pub files_skipped: u64,
    /// Entries that could not be read.
    pub errors: u64,
}

/// List every file under `root` whose name matches `filter`.
///
/// Only the top level is listed unless `recursive` is set. Entries are
/// sorted by file name within each directory so repeated scans agree.
/// Unreadable entries are logged and counted, not fatal.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory.
pub fn scan_directory(root: &Path, filter: &FileFilter, recursive: bool) -> Result<ScanResult> {
    if !root.is_dir() {
        return Err(WatcherError::ScanFailed {
            path: root.display().to_string(),
            reason: "not a directory".to_string(),
        }
        .into());
    }

    tracing::info!(path = %root.display(), recursive, "Starting directory scan");

    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name();

    let mut result = ScanResult::default();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                if filter.matches(entry.path()) {
                    result.files.push(entry.into_path());
                } else {
                    result.files_skipped += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error walking directory");
                result.errors += 1;
            }
        }
    }

    tracing::info!(
        path = %root.display(),
        found = result.files.len(),
        skipped = result.files_skipped,
        errors = result.errors,
        "Directory scan complete"
    );

    Ok(result)
}
