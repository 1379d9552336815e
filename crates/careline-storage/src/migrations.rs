// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations, embedded at build time.
//!
//! The SQL files under `migrations/` are compiled in via refinery's
//! `embed_migrations!`, so a deployed binary carries its own schema
//! history and `SqliteStore::open` can bring any database current.

use careline_core::CarelineError;
use tracing::debug;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies every migration not yet recorded in refinery's
/// `refinery_schema_history` table.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), CarelineError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| CarelineError::Storage {
            source: Box::new(e),
        })?;

    for migration in report.applied_migrations() {
        debug!(version = %migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}
