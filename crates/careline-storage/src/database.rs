// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use careline_core::CarelineError;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

/// Convert a tokio-rusqlite error into CarelineError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CarelineError {
    CarelineError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite connection.
///
/// Opening runs pending migrations and applies the standard PRAGMAs.
/// Query modules accept `&Database` and go through [`Database::connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled.
    pub async fn open(path: &str) -> Result<Self, CarelineError> {
        Self::open_with(path, true).await
    }

    /// Open (or create) the database at `path`.
    ///
    /// Applies PRAGMAs, then runs all pending migrations. `wal_mode`
    /// controls whether the journal is switched to WAL; everything else
    /// is applied unconditionally.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, CarelineError> {
        let conn = Connection::open(path).await.map_err(CarelineError::storage)?;
        Self::setup(conn, wal_mode).await
    }

    /// Open an in-memory database. Used by tests and `doctor` probes.
    pub async fn open_in_memory() -> Result<Self, CarelineError> {
        let conn = Connection::open_in_memory().await.map_err(CarelineError::storage)?;
        // WAL is meaningless for :memory: databases.
        Self::setup(conn, false).await
    }

    async fn setup(conn: Connection, wal_mode: bool) -> Result<Self, CarelineError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch(
                "PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA foreign_keys = ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(crate::migrations::run_migrations)
            .await
            .map_err(CarelineError::storage)?;

        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), CarelineError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        Ok(())
    }
}

/// Format a timestamp the way the schema's strftime defaults do.
pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse a stored ISO 8601 timestamp back into a DateTime.
pub(crate) fn ts_from_sql(idx: usize, raw: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a TEXT column into any FromStr type (handler, status, kind).
pub(crate) fn text_from_sql<T>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
