// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate counts for `status` reporting and the admin API.

use careline_core::{CarelineError, StoreStats};

use crate::database::Database;

/// Row counts across the main tables, in one snapshot.
pub async fn stats(db: &Database) -> Result<StoreStats, CarelineError> {
    db.connection()
        .call(|conn| -> Result<StoreStats, rusqlite::Error> {
            let count = |sql: &str| -> Result<i64, rusqlite::Error> {
                conn.query_row(sql, [], |row| row.get(0))
            };
            Ok(StoreStats {
                users: count("SELECT COUNT(*) FROM users")?,
                counsellors: count("SELECT COUNT(*) FROM counsellors")?,
                available_counsellors: count(
                    "SELECT COUNT(*) FROM counsellors WHERE current_ticket IS NULL",
                )?,
                open_tickets: count("SELECT COUNT(*) FROM tickets WHERE status = 'open'")?,
                assigned_tickets: count("SELECT COUNT(*) FROM tickets WHERE status = 'assigned'")?,
                closed_tickets: count("SELECT COUNT(*) FROM tickets WHERE status = 'closed'")?,
                messages: count("SELECT COUNT(*) FROM messages")?,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}
