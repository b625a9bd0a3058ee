//! gammawatch
//!
//! Watches a directory for gamma-spectrum files, turns each new spectrum into
//! a text report with an external analysis tool, parses the report into typed
//! records and stores them, importing every distinct file exactly once.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
