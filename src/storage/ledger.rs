//! Durable checksum ledger.
//!
//! The ledger is the deduplication key store: a checksum present here has
//! been imported and is never imported again. Access is scoped: callers
//! `open()` a session, check and insert through it, then `close()` it.

use std::path::Path;
use std::time::Instant;

use parking_lot::MutexGuard;
use rusqlite::Connection;

use super::connection::Database;
use super::schema::{has_table, migrate_ledger};
use crate::error::LedgerError;
use crate::Result;

/// Persisted set of imported content checksums.
pub trait ChecksumLedger: Send + Sync {
    /// Acquire a scoped handle on the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Open`] if the ledger is unreachable.
    fn open(&self) -> Result<Box<dyn LedgerSession + '_>>;
}

/// Scoped access to a [`ChecksumLedger`].
///
/// Dropping the session releases it just like [`LedgerSession::close`].
pub trait LedgerSession {
    /// Whether the checksum has already been imported.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Query`] if the lookup fails.
    fn has_checksum(&self, checksum: &str) -> Result<bool>;

    /// Record a checksum as imported. Recording it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Insert`] if the record cannot be persisted.
    fn insert_checksum(&mut self, checksum: &str, source: &Path) -> Result<()>;

    /// Release the session.
    fn close(self: Box<Self>);
}

/// `SQLite`-backed ledger.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    /// Wrap a database, creating the ledger table if needed.
    ///
    /// The ledger needs a database of its own: a session holds the
    /// connection for the whole import of a file, and the report store
    /// writes in between.
    ///
    /// # Errors
    ///
    /// Returns an error if the database already holds the report store or
    /// the ledger schema cannot be created.
    pub fn new(db: Database) -> Result<Self> {
        db.with_conn(|conn| {
            if has_table(conn, "spectra")? {
                return Err(LedgerError::Open(format!(
                    "{} already holds the report store",
                    db.path()
                ))
                .into());
            }
            migrate_ledger(conn)
        })
        .map_err(|e| match e {
            crate::Error::Ledger(_) => e,
            e => LedgerError::Open(e.to_string()).into(),
        })?;
        Ok(Self { db })
    }

    /// Number of imported checksums.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<i64> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM checksums", [], |row| row.get(0))
                .map_err(|e| LedgerError::Open(format!("failed to count checksums: {e}")).into())
        })
    }
}

impl ChecksumLedger for SqliteLedger {
    fn open(&self) -> Result<Box<dyn LedgerSession + '_>> {
        self.db
            .health_check()
            .map_err(|e| LedgerError::Open(format!("{}: {e}", self.db.path())))?;
        let conn = self.db.lock();

        Ok(Box::new(SqliteLedgerSession {
            conn,
            opened: Instant::now(),
        }))
    }
}

struct SqliteLedgerSession<'a> {
    conn: MutexGuard<'a, Connection>,
    opened: Instant,
}

impl LedgerSession for SqliteLedgerSession<'_> {
    fn has_checksum(&self, checksum: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM checksums WHERE checksum = ?",
                [checksum],
                |_| Ok(()),
            );

        match found {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(LedgerError::Query {
                checksum: checksum.to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    fn insert_checksum(&mut self, checksum: &str, source: &Path) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO checksums (checksum, source_path, imported_at) VALUES (?, ?, ?)",
                rusqlite::params![
                    checksum,
                    source.to_string_lossy(),
                    chrono::Utc::now().timestamp()
                ],
            )
            .map_err(|e| LedgerError::Insert {
                checksum: checksum.to_string(),
                reason: e.to_string(),
            })?;

        tracing::trace!(checksum, "Recorded checksum");
        Ok(())
    }

    fn close(self: Box<Self>) {
        tracing::trace!(held = ?self.opened.elapsed(), "Ledger session closed");
    }
}
