//! File name filtering.

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};

use crate::error::WatcherError;
use crate::Result;

/// Default pattern for spectrum files.
pub const DEFAULT_PATTERN: &str = "*.spe";

/// Glob filter applied to file names (never to directory components).
///
/// Matching is case-insensitive, so `*.spe` also accepts `SAMPLE.SPE`.
#[derive(Debug, Clone)]
pub struct FileFilter {
    pattern: String,
    matcher: GlobMatcher,
}

impl FileFilter {
    /// Compile a filter from a glob such as `*.spe`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid glob.
    pub fn new(pattern: &str) -> Result<Self> {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| WatcherError::InvalidFilter {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// The pattern this filter was built from.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the file name of `path` matches the pattern.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.matcher.is_match(Path::new(name)))
    }
}
