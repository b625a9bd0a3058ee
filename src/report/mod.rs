//! Analysis report model and parser.
//!
//! This module provides:
//! - `SpectrumReport` / `SpectrumResult` records
//! - The line-oriented report text parser

mod model;
mod parser;

pub use model::{SpectrumReport, SpectrumResult};
pub use parser::{parse_report, parse_report_file};
