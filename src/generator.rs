//! External report generator invocation.
//!
//! The analysis tool is a black box: it reads a spectrum file and a report
//! template and writes a text report. It is invoked as
//!
//! ```text
//! <tool> <spectrum> /TEMPLATE=<template> /NEWFILE /OUTFILE=<output>
//! ```
//!
//! where `/NEWFILE` makes the tool overwrite rather than append. Calls block
//! until the tool exits. The output path is fixed per pipeline, so two
//! invocations must never overlap.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::GeneratorError;
use crate::Result;

/// Polling interval while waiting on a tool with a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Turns a spectrum file into a report file.
pub trait ReportGenerator: Send + Sync {
    /// Run the generator to completion and return the path of the report.
    ///
    /// # Errors
    ///
    /// Returns a [`GeneratorError`] if the tool cannot be started, fails,
    /// times out, or writes no report.
    fn generate(&self, spectrum: &Path, template: &Path, output: &Path) -> Result<PathBuf>;
}

/// Generator backed by an external executable.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ExternalTool {
    /// Use the executable at `program`, with no timeout.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the tool if it runs longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the executable.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Wait for the child, enforcing the timeout if one is set.
    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let spawn_err = |e: std::io::Error| GeneratorError::Spawn {
            program: self.program_name(),
            reason: e.to_string(),
        };

        let Some(timeout) = self.timeout else {
            return Ok(child.wait().map_err(spawn_err)?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(spawn_err)? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                if let Err(e) = child.kill() {
                    tracing::warn!(error = %e, "Failed to kill timed out generator");
                }
                if let Err(e) = child.wait() {
                    tracing::debug!(error = %e, "Failed to reap timed out generator");
                }
                return Err(GeneratorError::TimedOut {
                    program: self.program_name(),
                    seconds: timeout.as_secs_f64(),
                }
                .into());
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ReportGenerator for ExternalTool {
    fn generate(&self, spectrum: &Path, template: &Path, output: &Path) -> Result<PathBuf> {
        // a stale report from an earlier run must not pass for this one
        match std::fs::remove_file(output) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(tool_arguments(spectrum, template, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GeneratorError::Spawn {
                program: self.program_name(),
                reason: e.to_string(),
            })?;

        // drain stderr concurrently so a chatty tool cannot fill the pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                if let Err(e) = stderr.read_to_string(&mut buf) {
                    tracing::debug!(error = %e, "Failed to read generator stderr");
                }
                buf
            })
        });

        // on timeout the reader is detached; grandchildren may still hold the pipe
        let status = self.wait(&mut child)?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(GeneratorError::ExitStatus {
                program: self.program_name(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        if !output.is_file() {
            return Err(GeneratorError::MissingOutput {
                path: output.display().to_string(),
            }
            .into());
        }

        tracing::debug!(
            spectrum = %spectrum.display(),
            elapsed = ?started.elapsed(),
            "Report generated"
        );

        Ok(output.to_path_buf())
    }
}

/// Command line for one invocation.
fn tool_arguments(spectrum: &Path, template: &Path, output: &Path) -> Vec<OsString> {
    let mut template_arg = OsString::from("/TEMPLATE=");
    template_arg.push(template);
    let mut output_arg = OsString::from("/OUTFILE=");
    output_arg.push(output);

    vec![
        spectrum.as_os_str().to_os_string(),
        template_arg,
        OsString::from("/NEWFILE"),
        output_arg,
    ]
}
