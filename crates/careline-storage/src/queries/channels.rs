// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counsellor channel bindings.
//!
//! Each counsellor has one binding per channel kind; `order_priority`
//! decides the failover order when dispatching (lowest first).

use careline_core::{CarelineError, ChannelBinding, CounsellorId};
use rusqlite::params;

use crate::database::Database;

fn row_to_binding(row: &rusqlite::Row) -> Result<ChannelBinding, rusqlite::Error> {
    Ok(ChannelBinding {
        counsellor_id: CounsellorId(row.get(0)?),
        kind: row.get(1)?,
        channel_id: row.get(2)?,
        auth_key: row.get(3)?,
        order_priority: row.get(4)?,
    })
}

/// Bind a channel address to a counsellor.
///
/// Fails with `NotFound` for an unknown counsellor and `Conflict` when the
/// counsellor already has a binding of this kind.
pub async fn add_channel(db: &Database, binding: &ChannelBinding) -> Result<(), CarelineError> {
    let b = binding.clone();
    // (counsellor_found, inserted)
    let (found, inserted) = db
        .connection()
        .call(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM counsellors WHERE id = ?1",
                params![b.counsellor_id.0],
                |row| row.get::<_, i64>(0).map(|n| n > 0),
            )?;
            if !exists {
                return Ok((false, false));
            }
            match conn.execute(
                "INSERT INTO channels (counsellor_id, kind, channel_id, auth_key, order_priority)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![b.counsellor_id.0, b.kind, b.channel_id, b.auth_key, b.order_priority],
            ) {
                Ok(_) => Ok((true, true)),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok((true, false))
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if !found {
        return Err(CarelineError::NotFound {
            entity: "counsellor",
            id: binding.counsellor_id.0.clone(),
        });
    }
    if !inserted {
        return Err(CarelineError::Conflict(format!(
            "counsellor {} already has a {} channel",
            binding.counsellor_id, binding.kind
        )));
    }
    Ok(())
}

/// The counsellor's channel bindings in failover order.
pub async fn get_counsellor_channels_ordered(
    db: &Database,
    id: &CounsellorId,
) -> Result<Vec<ChannelBinding>, CarelineError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT counsellor_id, kind, channel_id, auth_key, order_priority
                 FROM channels WHERE counsellor_id = ?1
                 ORDER BY order_priority ASC, kind ASC",
            )?;
            let rows = stmt.query_map(params![id], row_to_binding)?;
            let mut bindings = Vec::new();
            for row in rows {
                bindings.push(row?);
            }
            Ok(bindings)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
