//! Parsed report records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One nuclide row recovered from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    /// Nuclide name as printed in the report (e.g. "CS-137").
    pub nuclide_name: String,

    /// Measured activity.
    pub activity: f64,

    /// Statistical uncertainty of the activity.
    pub activity_uncertainty: f64,

    /// Minimum detectable activity, 0.0 until an MDA row names this nuclide.
    pub mda: f64,
}

impl SpectrumResult {
    /// Create a result with no MDA value yet.
    #[must_use]
    pub fn new(nuclide_name: impl Into<String>, activity: f64, activity_uncertainty: f64) -> Self {
        Self {
            nuclide_name: nuclide_name.into(),
            activity,
            activity_uncertainty,
            mda: 0.0,
        }
    }
}

/// Everything recovered from one generated report.
///
/// Text fields are empty when the report did not carry them; numeric and
/// time fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumReport {
    /// Spectrum file the report was generated from.
    pub source_path: String,

    /// Content checksum of the spectrum file.
    pub checksum: String,

    pub laboratory: String,
    pub operator: String,
    pub sample_identification: String,
    pub sample_type: String,
    pub sample_geometry: String,
    pub sample_location: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,

    pub sample_size: Option<f64>,
    pub sample_error: Option<f64>,
    pub sample_unit: String,

    pub comment: String,

    /// Name of the nuclide library the analysis used.
    pub nuclide_library: String,

    /// When the sample was taken.
    pub sample_time: Option<NaiveDateTime>,

    /// When acquisition started on the detector.
    pub acquisition_time: Option<NaiveDateTime>,

    /// Live time in seconds.
    pub live_time: Option<f64>,
    /// Real time in seconds.
    pub real_time: Option<f64>,
    /// Dead time in percent.
    pub dead_time: Option<f64>,

    /// Nuclide results in report order.
    pub results: Vec<SpectrumResult>,
}

impl SpectrumReport {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the report with the spectrum file it came from.
    #[must_use]
    pub fn with_source(mut self, source_path: impl Into<String>, checksum: impl Into<String>) -> Self {
        self.source_path = source_path.into();
        self.checksum = checksum.into();
        self
    }

    /// Look up a result by exact nuclide name.
    #[must_use]
    pub fn result(&self, nuclide_name: &str) -> Option<&SpectrumResult> {
        self.results.iter().find(|r| r.nuclide_name == nuclide_name)
    }

    pub(crate) fn result_mut(&mut self, nuclide_name: &str) -> Option<&mut SpectrumResult> {
        self.results
            .iter_mut()
            .find(|r| r.nuclide_name == nuclide_name)
    }
}
