//! Database schema definitions and migrations.
//!
//! The checksum ledger and the report store carry separate schemas, each
//! versioned through its own migrations table, so neither can mistake the
//! other's version for its own.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Current report store schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Current ledger schema version.
pub const LEDGER_SCHEMA_VERSION: i32 = 1;

const REPORT_MIGRATIONS: &str = "schema_migrations";
const LEDGER_MIGRATIONS: &str = "ledger_migrations";

/// Run all pending report store migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    ensure_migrations_table(conn, REPORT_MIGRATIONS)?;

    let current_version = get_current_version(conn, REPORT_MIGRATIONS)?;
    tracing::info!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking report store migrations"
    );

    if current_version < 1 {
        migrate_reports_v1(conn)?;
    }

    Ok(())
}

/// Run all pending ledger migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate_ledger(conn: &Connection) -> Result<()> {
    ensure_migrations_table(conn, LEDGER_MIGRATIONS)?;

    let current_version = get_current_version(conn, LEDGER_MIGRATIONS)?;
    tracing::debug!(
        current = current_version,
        target = LEDGER_SCHEMA_VERSION,
        "Checking ledger migrations"
    );

    if current_version < 1 {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS checksums (
                checksum TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                imported_at INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| StorageError::Migration(format!("ledger v1 migration failed: {e}")))?;
        record_migration(conn, LEDGER_MIGRATIONS, 1)?;
    }

    Ok(())
}

fn ensure_migrations_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )"
        ),
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create {table}: {e}")))?;
    Ok(())
}

/// Get the schema version recorded in a migrations table.
fn get_current_version(conn: &Connection, table: &str) -> Result<i32> {
    conn.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {table}"),
        [],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::Migration(format!("failed to get version: {e}")).into())
}

/// Record a migration as applied.
fn record_migration(conn: &Connection, table: &str, version: i32) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO {table} (version, applied_at) VALUES (?, ?)"),
        rusqlite::params![version, chrono::Utc::now().timestamp()],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;

    Ok(())
}

/// Whether a table exists in the connected database.
///
/// # Errors
///
/// Returns an error if the schema cannot be queried.
pub fn has_table(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        [table],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::Database(format!("failed to inspect schema: {e}")).into())
}

/// Migration v1: spectra and their nuclide results.
fn migrate_reports_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: spectra schema");

    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS spectra (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            checksum TEXT NOT NULL,
            source_path TEXT NOT NULL,
            laboratory TEXT NOT NULL,
            operator TEXT NOT NULL,
            sample_identification TEXT NOT NULL,
            sample_type TEXT NOT NULL,
            sample_geometry TEXT NOT NULL,
            sample_location TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            altitude REAL,
            sample_size REAL,
            sample_error REAL,
            sample_unit TEXT NOT NULL,
            comment TEXT NOT NULL,
            nuclide_library TEXT NOT NULL,
            sample_time TEXT,
            acquisition_time TEXT,
            live_time REAL,
            real_time REAL,
            dead_time REAL,
            imported_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_spectra_checksum ON spectra(checksum);
        CREATE INDEX IF NOT EXISTS idx_spectra_sample_time ON spectra(sample_time);

        CREATE TABLE IF NOT EXISTS spectrum_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            spectrum_id INTEGER NOT NULL REFERENCES spectra(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            nuclide_name TEXT NOT NULL,
            activity REAL NOT NULL,
            activity_uncertainty REAL NOT NULL,
            mda REAL NOT NULL,
            UNIQUE(spectrum_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_results_nuclide ON spectrum_results(nuclide_name);
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, REPORT_MIGRATIONS, 1)?;
    tracing::info!("Migration v1 complete");

    Ok(())
}

/// Verify all expected report store tables exist.
///
/// # Errors
///
/// Returns an error if any expected table is missing from the schema.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for table in ["spectra", "spectrum_results"] {
        if !has_table(conn, table)? {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}
