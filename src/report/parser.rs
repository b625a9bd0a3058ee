//! Line-oriented parser for generated analysis reports.
//!
//! A report is plain text. Scalar fields appear one per line as
//! `<Tag Name>:::<value>`. Nuclide results are framed by section markers:
//!
//! ```text
//! +++INTR+++
//! CS-137   0.95  661.66  1.00  1.234E+01  5.0E-01
//! ---INTR---
//! +++MDA+++
//! CS-137   0.95  661.66  1.00  3.2E-01  0.0  0.0
//! ---MDA---
//! ```
//!
//! Activity rows carry exactly six whitespace-separated tokens and MDA rows
//! exactly seven; any other row inside a section is skipped. Everything
//! outside the recognised tags and sections is ignored.

use std::path::Path;

use chrono::NaiveDateTime;

use super::model::{SpectrumReport, SpectrumResult};
use crate::error::ParseError;
use crate::Result;

/// Separator between a tag name and its value.
const DELIMITER: &str = ":::";

const INTR_BEGIN: &str = "+++INTR+++";
const INTR_END: &str = "---INTR---";
const MDA_BEGIN: &str = "+++MDA+++";
const MDA_END: &str = "---MDA---";

const ACTIVITY_ROW_TOKENS: usize = 6;
const MDA_ROW_TOKENS: usize = 7;

/// Date-time layouts accepted for sample and acquisition times.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Laboratory,
    Operator,
    SampleIdentification,
    SampleType,
    SampleGeometry,
    SampleLocation,
    SampleCoordinates,
    SampleSizeError,
    SampleTakenOn,
    AcquisitionStarted,
    LiveTime,
    RealTime,
    DeadTime,
    Comment,
    NuclideLibrary,
}

/// Scalar tags in match priority order.
const TAGS: &[(&str, Tag)] = &[
    ("Laboratory", Tag::Laboratory),
    ("Operator", Tag::Operator),
    ("Sample Title", Tag::SampleIdentification),
    ("Sample Identification", Tag::SampleIdentification),
    ("Sample Type", Tag::SampleType),
    ("Sample Geometry", Tag::SampleGeometry),
    ("Sample Location", Tag::SampleLocation),
    ("Sample Coordinates", Tag::SampleCoordinates),
    ("Sample Size/Error", Tag::SampleSizeError),
    ("Sample Taken On", Tag::SampleTakenOn),
    ("Acquisition Started", Tag::AcquisitionStarted),
    ("Live Time", Tag::LiveTime),
    ("Real Time", Tag::RealTime),
    ("Dead Time", Tag::DeadTime),
    ("Comment", Tag::Comment),
    ("Nuclide Library Used", Tag::NuclideLibrary),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Activity,
    Mda,
}

/// Parse the full text of a report.
///
/// # Errors
///
/// Returns a [`ParseError`] when a numeric or date-time value cannot be
/// read. No partially filled report is returned in that case.
pub fn parse_report(text: &str) -> std::result::Result<SpectrumReport, ParseError> {
    let mut report = SpectrumReport::new();
    let mut section = Section::Header;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        match section {
            Section::Activity => {
                if line == INTR_END {
                    section = Section::Header;
                } else {
                    read_activity_row(&mut report, line, line_no)?;
                }
                continue;
            }
            Section::Mda => {
                if line == MDA_END {
                    section = Section::Header;
                } else {
                    read_mda_row(&mut report, line, line_no)?;
                }
                continue;
            }
            Section::Header => {}
        }

        if let Some((tag, value)) = match_tag(line) {
            apply_tag(&mut report, tag, value, line_no)?;
        } else if line == INTR_BEGIN {
            report.results.clear();
            section = Section::Activity;
        } else if line == MDA_BEGIN {
            section = Section::Mda;
        }
    }

    if section != Section::Header {
        tracing::warn!(?section, "Report ended inside an unterminated section");
    }

    Ok(report)
}

/// Read and parse a report file.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected; report
/// templates commonly emit legacy code pages.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn parse_report_file(path: impl AsRef<Path>) -> Result<SpectrumReport> {
    let bytes = std::fs::read(path.as_ref())?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_report(&text)?)
}

/// Find the first tag the line starts with and return its trimmed value.
fn match_tag(line: &str) -> Option<(Tag, &str)> {
    TAGS.iter().find_map(|(name, tag)| {
        let rest = line.strip_prefix(name)?;
        let (_, value) = rest.split_once(DELIMITER)?;
        Some((*tag, value.trim()))
    })
}

fn apply_tag(
    report: &mut SpectrumReport,
    tag: Tag,
    value: &str,
    line: usize,
) -> std::result::Result<(), ParseError> {
    match tag {
        Tag::Laboratory => report.laboratory = value.to_string(),
        Tag::Operator => report.operator = value.to_string(),
        Tag::SampleIdentification => report.sample_identification = value.to_string(),
        Tag::SampleType => report.sample_type = value.to_string(),
        Tag::SampleGeometry => report.sample_geometry = value.to_string(),
        Tag::SampleLocation => report.sample_location = value.to_string(),
        Tag::Comment => report.comment = value.to_string(),
        Tag::NuclideLibrary => report.nuclide_library = value.to_string(),
        Tag::SampleCoordinates => {
            let mut tokens = value.split_whitespace();
            report.latitude = optional_number(tokens.next(), "latitude", line)?;
            report.longitude = optional_number(tokens.next(), "longitude", line)?;
            report.altitude = optional_number(tokens.next(), "altitude", line)?;
        }
        Tag::SampleSizeError => {
            let mut tokens = value.split_whitespace();
            report.sample_size = optional_number(tokens.next(), "sample size", line)?;
            report.sample_error = optional_number(tokens.next(), "sample error", line)?;
            report.sample_unit = tokens.next().unwrap_or_default().to_string();
        }
        Tag::SampleTakenOn => {
            report.sample_time = parse_datetime(value, "sample time", line)?;
        }
        Tag::AcquisitionStarted => {
            report.acquisition_time = parse_datetime(value, "acquisition time", line)?;
        }
        Tag::LiveTime => report.live_time = scalar_number(value, "live time", line)?,
        Tag::RealTime => report.real_time = scalar_number(value, "real time", line)?,
        Tag::DeadTime => report.dead_time = scalar_number(value, "dead time", line)?,
    }
    Ok(())
}

fn read_activity_row(
    report: &mut SpectrumReport,
    line: &str,
    line_no: usize,
) -> std::result::Result<(), ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != ACTIVITY_ROW_TOKENS {
        return Ok(());
    }

    let activity = parse_number(tokens[4], "activity", line_no)?;
    let uncertainty = parse_number(tokens[5], "activity uncertainty", line_no)?;
    report
        .results
        .push(SpectrumResult::new(tokens[0], activity, uncertainty));
    Ok(())
}

fn read_mda_row(
    report: &mut SpectrumReport,
    line: &str,
    line_no: usize,
) -> std::result::Result<(), ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != MDA_ROW_TOKENS {
        return Ok(());
    }

    let mda = parse_number(tokens[4], "mda", line_no)?;
    match report.result_mut(tokens[0]) {
        Some(result) => result.mda = mda,
        None => {
            tracing::debug!(nuclide = tokens[0], line = line_no, "MDA row has no activity result, dropped");
        }
    }
    Ok(())
}

/// Numbers always use `.` as the decimal separator.
fn parse_number(
    token: &str,
    field: &'static str,
    line: usize,
) -> std::result::Result<f64, ParseError> {
    token.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        line,
        field,
        value: token.to_string(),
    })
}

fn optional_number(
    token: Option<&str>,
    field: &'static str,
    line: usize,
) -> std::result::Result<Option<f64>, ParseError> {
    token.map(|t| parse_number(t, field, line)).transpose()
}

fn scalar_number(
    value: &str,
    field: &'static str,
    line: usize,
) -> std::result::Result<Option<f64>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_number(value, field, line).map(Some)
}

fn parse_datetime(
    value: &str,
    field: &'static str,
    line: usize,
) -> std::result::Result<Option<NaiveDateTime>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(Some)
        .ok_or_else(|| ParseError::InvalidDateTime {
            line,
            field,
            value: value.to_string(),
        })
}
