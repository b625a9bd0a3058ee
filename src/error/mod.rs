//! Error types and Result aliases for gammawatch.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using gammawatch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gammawatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Report storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Checksum ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Report parsing error.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// External report generator error.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Checksum ledger errors.
///
/// Any of these makes the pipeline stop: without a reachable ledger there is
/// no way to tell imported content from new content.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Ledger could not be opened.
    #[error("failed to open ledger: {0}")]
    Open(String),

    /// Membership query failed.
    #[error("failed to query checksum '{checksum}': {reason}")]
    Query { checksum: String, reason: String },

    /// Insert failed.
    #[error("failed to record checksum '{checksum}': {reason}")]
    Insert { checksum: String, reason: String },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Invalid file name filter.
    #[error("invalid filter pattern '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },

    /// Directory enumeration error.
    #[error("failed to scan '{path}': {reason}")]
    ScanFailed { path: String, reason: String },
}

/// Report parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A numeric token could not be read.
    #[error("line {line}: invalid number '{value}' for {field}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    /// A date-time value could not be read.
    #[error("line {line}: invalid date-time '{value}' for {field}")]
    InvalidDateTime {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// External report generator errors.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Tool could not be started.
    #[error("failed to launch '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// Tool exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    /// Tool ran past the configured timeout and was killed.
    #[error("'{program}' timed out after {seconds:.1}s")]
    TimedOut { program: String, seconds: f64 },

    /// Tool exited cleanly but left no report behind.
    #[error("no report written to '{path}'")]
    MissingOutput { path: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must stop the pipeline instead of skipping a file.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Ledger(_))
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl ParseError {
    /// Line number (1-based) the error was raised on.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::InvalidNumber { line, .. } | Self::InvalidDateTime { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests;
