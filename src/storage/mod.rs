//! `SQLite` storage.
//!
//! This module provides persistent storage for:
//! - The checksum ledger (deduplication keys)
//! - Parsed spectrum reports and their nuclide results

mod connection;
mod ledger;
mod reports;
mod schema;

pub use connection::Database;
pub use ledger::{ChecksumLedger, LedgerSession, SqliteLedger};
pub use reports::{
    count_reports, find_reports_by_checksum, get_report, insert_report, ReportSink,
    SqliteReportStore,
};
pub use schema::{
    has_table, migrate, migrate_ledger, verify_schema, LEDGER_SCHEMA_VERSION, SCHEMA_VERSION,
};
