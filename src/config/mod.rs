//! Configuration management.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`GAMMAWATCH_*`)
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::Config;
