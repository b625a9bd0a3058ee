//! Configuration settings and validation.

use crate::watcher::DEFAULT_PATTERN;
use crate::{Error, Result};
use std::path::{Component, PathBuf};
use std::time::Duration;

/// Main configuration for the ingestion service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` databases and the scratch report.
    pub data_dir: PathBuf,

    /// Directory watched for new spectrum files.
    pub watch_dir: PathBuf,

    /// File name glob for spectrum files.
    pub pattern: String,

    /// Watch subdirectories of `watch_dir` too.
    pub recursive: bool,

    /// Also import files whose contents change in place.
    pub include_changes: bool,

    /// Interval between queue drains.
    pub tick_interval: Duration,

    /// External analysis tool executable.
    pub generator: PathBuf,

    /// Report template handed to the tool.
    pub template: PathBuf,

    /// Where the tool writes its report. Defaults to `<data_dir>/report.txt`.
    pub report_output: Option<PathBuf>,

    /// Kill the tool after this long. `None` waits indefinitely.
    pub generator_timeout: Option<Duration>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            watch_dir: PathBuf::from("./incoming"),
            pattern: DEFAULT_PATTERN.to_string(),
            recursive: true,
            include_changes: false,
            tick_interval: Duration::from_millis(500),
            generator: PathBuf::from("gammareport"),
            template: PathBuf::from("./report.tpl"),
            report_output: None,
            generator_timeout: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    ///
    /// Only checks values, not the file system; see
    /// [`check_collaborators`](Self::check_collaborators).
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.pattern.trim().is_empty() {
            return Err(Error::config("file pattern cannot be empty"));
        }

        if self.tick_interval.is_zero() {
            return Err(Error::config("tick interval cannot be 0"));
        }

        if self.generator_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("generator timeout cannot be 0"));
        }

        if self.generator.as_os_str().is_empty() {
            return Err(Error::config("generator path cannot be empty"));
        }

        Ok(())
    }

    /// Check that the directories and collaborators the pipeline needs exist.
    ///
    /// Any failure here is fatal at startup: nothing is watched until the
    /// tool and template are in place.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing collaborator.
    pub fn check_collaborators(&self) -> Result<()> {
        if !self.watch_dir.is_dir() {
            return Err(Error::config(format!(
                "watch directory not found: {}",
                self.watch_dir.display()
            )));
        }

        self.resolve_generator()?;

        if !self.template.is_file() {
            return Err(Error::config(format!(
                "report template not found: {}",
                self.template.display()
            )));
        }

        Ok(())
    }

    /// Locate the generator executable.
    ///
    /// A bare program name is looked up on `PATH`; anything with a directory
    /// part must name an existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the generator cannot be found.
    pub fn resolve_generator(&self) -> Result<PathBuf> {
        let mut components = self.generator.components();
        let bare = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        let not_found = || {
            Error::config(format!(
                "report generator not found: {}",
                self.generator.display()
            ))
        };

        if bare {
            which::which(&self.generator).map_err(|_| not_found())
        } else if self.generator.is_file() {
            Ok(self.generator.clone())
        } else {
            Err(not_found())
        }
    }

    /// Path of the checksum ledger database.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }

    /// Path of the spectrum report database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("spectra.db")
    }

    /// Path the generator writes its report to.
    #[must_use]
    pub fn report_output(&self) -> PathBuf {
        self.report_output
            .clone()
            .unwrap_or_else(|| self.data_dir.join("report.txt"))
    }
}
