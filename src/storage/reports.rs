//! Parsed report storage.

use rusqlite::{params, Connection};

use super::connection::Database;
use super::schema::{has_table, migrate, verify_schema};
use crate::error::StorageError;
use crate::report::{SpectrumReport, SpectrumResult};
use crate::Result;

/// Downstream consumer of parsed reports.
pub trait ReportSink: Send + Sync {
    /// Persist one fully populated report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be stored. The caller then
    /// withholds the checksum so the file is retried later.
    fn store(&self, report: &SpectrumReport) -> Result<()>;
}

/// `SQLite` report store.
#[derive(Debug, Clone)]
pub struct SqliteReportStore {
    db: Database,
}

impl SqliteReportStore {
    /// Wrap a database, running report migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database already holds the checksum ledger,
    /// or if migrations fail.
    pub fn new(db: Database) -> Result<Self> {
        db.with_conn(|conn| {
            if has_table(conn, "checksums")? {
                return Err(StorageError::Migration(format!(
                    "{} already holds the checksum ledger",
                    db.path()
                ))
                .into());
            }
            migrate(conn)?;
            verify_schema(conn)
        })?;
        Ok(Self { db })
    }

    /// Underlying database handle.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}

impl ReportSink for SqliteReportStore {
    fn store(&self, report: &SpectrumReport) -> Result<()> {
        let id = self.db.with_transaction(|conn| insert_report(conn, report))?;
        tracing::debug!(id, results = report.results.len(), "Stored spectrum report");
        Ok(())
    }
}

/// Insert a report and its results, returning the new spectrum id.
///
/// Run inside a transaction so a report is never stored without its results.
///
/// # Errors
///
/// Returns an error if any insert fails.
pub fn insert_report(conn: &Connection, report: &SpectrumReport) -> Result<i64> {
    conn.execute(
        "INSERT INTO spectra (checksum, source_path, laboratory, operator, sample_identification,
            sample_type, sample_geometry, sample_location, latitude, longitude, altitude,
            sample_size, sample_error, sample_unit, comment, nuclide_library, sample_time,
            acquisition_time, live_time, real_time, dead_time, imported_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            report.checksum,
            report.source_path,
            report.laboratory,
            report.operator,
            report.sample_identification,
            report.sample_type,
            report.sample_geometry,
            report.sample_location,
            report.latitude,
            report.longitude,
            report.altitude,
            report.sample_size,
            report.sample_error,
            report.sample_unit,
            report.comment,
            report.nuclide_library,
            report.sample_time,
            report.acquisition_time,
            report.live_time,
            report.real_time,
            report.dead_time,
            chrono::Utc::now().timestamp(),
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert spectrum: {e}")))?;

    let spectrum_id = conn.last_insert_rowid();

    let mut stmt = conn
        .prepare(
            "INSERT INTO spectrum_results (spectrum_id, position, nuclide_name, activity,
                activity_uncertainty, mda)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    for (position, result) in report.results.iter().enumerate() {
        stmt.execute(params![
            spectrum_id,
            i64::try_from(position).unwrap_or(i64::MAX),
            result.nuclide_name,
            result.activity,
            result.activity_uncertainty,
            result.mda,
        ])
        .map_err(|e| StorageError::Database(format!("failed to insert result: {e}")))?;
    }

    Ok(spectrum_id)
}

/// Load a stored report by spectrum id.
///
/// # Errors
///
/// Returns `NotFound` if no spectrum has this id.
pub fn get_report(conn: &Connection, id: i64) -> Result<SpectrumReport> {
    let mut report = conn
        .query_row(
            "SELECT checksum, source_path, laboratory, operator, sample_identification,
                sample_type, sample_geometry, sample_location, latitude, longitude, altitude,
                sample_size, sample_error, sample_unit, comment, nuclide_library, sample_time,
                acquisition_time, live_time, real_time, dead_time
             FROM spectra WHERE id = ?",
            [id],
            |row| {
                Ok(SpectrumReport {
                    checksum: row.get(0)?,
                    source_path: row.get(1)?,
                    laboratory: row.get(2)?,
                    operator: row.get(3)?,
                    sample_identification: row.get(4)?,
                    sample_type: row.get(5)?,
                    sample_geometry: row.get(6)?,
                    sample_location: row.get(7)?,
                    latitude: row.get(8)?,
                    longitude: row.get(9)?,
                    altitude: row.get(10)?,
                    sample_size: row.get(11)?,
                    sample_error: row.get(12)?,
                    sample_unit: row.get(13)?,
                    comment: row.get(14)?,
                    nuclide_library: row.get(15)?,
                    sample_time: row.get(16)?,
                    acquisition_time: row.get(17)?,
                    live_time: row.get(18)?,
                    real_time: row.get(19)?,
                    dead_time: row.get(20)?,
                    results: Vec::new(),
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StorageError::not_found("spectrum", id.to_string()).into()
            }
            e => crate::Error::from(StorageError::Database(format!(
                "failed to get spectrum: {e}"
            ))),
        })?;

    let mut stmt = conn
        .prepare(
            "SELECT nuclide_name, activity, activity_uncertainty, mda
             FROM spectrum_results WHERE spectrum_id = ? ORDER BY position",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    report.results = stmt
        .query_map([id], |row| {
            Ok(SpectrumResult {
                nuclide_name: row.get(0)?,
                activity: row.get(1)?,
                activity_uncertainty: row.get(2)?,
                mda: row.get(3)?,
            })
        })
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(report)
}

/// Ids of spectra stored for a checksum, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_reports_by_checksum(conn: &Connection, checksum: &str) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT id FROM spectra WHERE checksum = ? ORDER BY id")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let ids = stmt
        .query_map([checksum], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(ids)
}

/// Count stored spectra.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_reports(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM spectra", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
