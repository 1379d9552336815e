// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket lifecycle operations.
//!
//! A user has at most one non-closed ticket (enforced by a partial unique
//! index). Status changes go through [`update_ticket_status`], which is a
//! compare-and-set on the current status.

use careline_core::{CarelineError, Handler, Ticket, TicketId, TicketStatus, UserId};
use chrono::Utc;
use rusqlite::params;

use crate::database::{text_from_sql, ts_from_sql, ts_to_sql, Database};

pub(crate) fn row_to_ticket(row: &rusqlite::Row) -> Result<Ticket, rusqlite::Error> {
    Ok(Ticket {
        id: TicketId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        handler: text_from_sql(2, row.get(2)?)?,
        status: text_from_sql(3, row.get(3)?)?,
        transcript: row.get(4)?,
        created_at: ts_from_sql(5, row.get(5)?)?,
        closed_at: row
            .get::<_, Option<String>>(6)?
            .map(|raw| ts_from_sql(6, raw))
            .transpose()?,
    })
}

const TICKET_COLUMNS: &str = "id, user_id, handler, status, transcript, created_at, closed_at";

/// Create a ticket for the user, or return the existing non-closed one.
///
/// The enqueue side of ticket creation is idempotent: repeated escalations
/// while a ticket is open or assigned reuse that ticket instead of growing
/// the queue.
pub async fn create_ticket_if_absent(
    db: &Database,
    user_id: &UserId,
    handler: Handler,
    transcript_seed: &str,
) -> Result<Ticket, CarelineError> {
    let user_id = user_id.0.clone();
    let transcript_seed = transcript_seed.to_string();
    let new_id = uuid::Uuid::new_v4().to_string();
    let created_at = ts_to_sql(&Utc::now());

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {TICKET_COLUMNS} FROM tickets
                     WHERE user_id = ?1 AND status != 'closed' LIMIT 1"
                ))?;
                match stmt.query_row(params![user_id], row_to_ticket) {
                    Ok(ticket) => Some(ticket),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };

            let ticket = match existing {
                Some(ticket) => ticket,
                None => {
                    tx.execute(
                        "INSERT INTO tickets (id, user_id, handler, status, transcript, created_at)
                         VALUES (?1, ?2, ?3, 'open', ?4, ?5)",
                        params![new_id, user_id, handler.to_string(), transcript_seed, created_at],
                    )?;
                    let mut stmt = tx.prepare(&format!(
                        "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"
                    ))?;
                    stmt.query_row(params![new_id], row_to_ticket)?
                }
            };

            tx.commit()?;
            Ok(ticket)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a ticket by ID.
pub async fn get_ticket(db: &Database, id: &TicketId) -> Result<Option<Ticket>, CarelineError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_ticket) {
                Ok(ticket) => Ok(Some(ticket)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the user's non-closed ticket, if any.
pub async fn get_active_ticket_for_user(
    db: &Database,
    user_id: &UserId,
) -> Result<Option<Ticket>, CarelineError> {
    let user_id = user_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TICKET_COLUMNS} FROM tickets
                 WHERE user_id = ?1 AND status != 'closed' LIMIT 1"
            ))?;
            match stmt.query_row(params![user_id], row_to_ticket) {
                Ok(ticket) => Ok(Some(ticket)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compare-and-set the ticket status.
///
/// The update applies only while the current status is one of `expected`.
/// Moving to `closed` stamps `closed_at`. Returns `true` if exactly one row
/// changed, `false` if the ticket is missing or the predicate did not hold.
pub async fn update_ticket_status(
    db: &Database,
    id: &TicketId,
    expected: &[TicketStatus],
    to: TicketStatus,
) -> Result<bool, CarelineError> {
    if expected.is_empty() {
        return Ok(false);
    }
    let id = id.0.clone();
    let to_s = to.to_string();
    let expected_s: Vec<String> = expected.iter().map(|s| s.to_string()).collect();

    db.connection()
        .call(move |conn| {
            let placeholders: Vec<String> =
                (3..3 + expected_s.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "UPDATE tickets SET status = ?1,
                     closed_at = CASE WHEN ?1 = 'closed'
                         THEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         ELSE closed_at END
                 WHERE id = ?2 AND status IN ({})",
                placeholders.join(", ")
            );
            let mut param_refs: Vec<&dyn rusqlite::types::ToSql> = vec![&to_s, &id];
            for e in &expected_s {
                param_refs.push(e as &dyn rusqlite::types::ToSql);
            }
            let rows = conn.execute(&sql, param_refs.as_slice())?;
            Ok(rows == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The open ticket that has waited longest, by creation time.
pub async fn oldest_open_ticket(db: &Database) -> Result<Option<Ticket>, CarelineError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TICKET_COLUMNS} FROM tickets
                 WHERE status = 'open'
                 ORDER BY created_at ASC, id ASC LIMIT 1"
            ))?;
            match stmt.query_row([], row_to_ticket) {
                Ok(ticket) => Ok(Some(ticket)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List tickets, optionally filtered by status. Newest first.
pub async fn list_tickets(
    db: &Database,
    status: Option<TicketStatus>,
) -> Result<Vec<Ticket>, CarelineError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut tickets = Vec::new();
            match &status {
                Some(filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TICKET_COLUMNS} FROM tickets
                         WHERE status = ?1 ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![filter], row_to_ticket)?;
                    for row in rows {
                        tickets.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map([], row_to_ticket)?;
                    for row in rows {
                        tickets.push(row?);
                    }
                }
            }
            Ok(tickets)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::upsert_user;
    use careline_core::User;
    use tempfile::tempdir;

    async fn setup_db_with_user(user_id: &str) -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let user = User::new(UserId(user_id.to_string()), "en".into());
        upsert_user(&db, &user).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_ticket_and_reuse_while_active() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let uid = UserId("u1".into());

        let first = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "u1: help\n")
            .await
            .unwrap();
        assert_eq!(first.status, TicketStatus::Open);
        assert_eq!(first.transcript, "u1: help\n");

        // Repeated escalation reuses the open ticket.
        let second = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "ignored")
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.transcript, "u1: help\n");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn closed_ticket_is_not_reused() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let uid = UserId("u1".into());

        let first = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "")
            .await
            .unwrap();
        let changed = update_ticket_status(
            &db,
            &first.id,
            &[TicketStatus::Open, TicketStatus::Assigned],
            TicketStatus::Closed,
        )
        .await
        .unwrap();
        assert!(changed);

        let second = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "")
            .await
            .unwrap();
        assert_ne!(second.id, first.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_cas_fails_when_predicate_does_not_hold() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let uid = UserId("u1".into());
        let ticket = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "")
            .await
            .unwrap();

        // open -> assigned wins.
        assert!(
            update_ticket_status(&db, &ticket.id, &[TicketStatus::Open], TicketStatus::Assigned)
                .await
                .unwrap()
        );
        // A second open -> assigned attempt loses.
        assert!(
            !update_ticket_status(&db, &ticket.id, &[TicketStatus::Open], TicketStatus::Assigned)
                .await
                .unwrap()
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn closing_stamps_closed_at() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let uid = UserId("u1".into());
        let ticket = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "")
            .await
            .unwrap();
        assert!(ticket.closed_at.is_none());

        update_ticket_status(&db, &ticket.id, &[TicketStatus::Open], TicketStatus::Closed)
            .await
            .unwrap();

        let closed = get_ticket(&db, &ticket.id).await.unwrap().unwrap();
        assert_eq!(closed.status, TicketStatus::Closed);
        assert!(closed.closed_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn oldest_open_ticket_is_fifo() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("fifo.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        for (uid, created) in [
            ("u-late", "2026-03-01T10:00:00.000Z"),
            ("u-early", "2026-03-01T09:00:00.000Z"),
        ] {
            upsert_user(&db, &User::new(UserId(uid.into()), "en".into()))
                .await
                .unwrap();
            let created = created.to_string();
            let uid = uid.to_string();
            db.connection()
                .call(move |conn| -> Result<(), rusqlite::Error> {
                    conn.execute(
                        "INSERT INTO tickets (id, user_id, handler, status, transcript, created_at)
                         VALUES (?1, ?2, 'counsellor', 'open', '', ?3)",
                        params![format!("t-{uid}"), uid, created],
                    )?;
                    Ok(())
                })
                .await
                .unwrap();
        }

        let oldest = oldest_open_ticket(&db).await.unwrap().unwrap();
        assert_eq!(oldest.user_id.0, "u-early");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_tickets_with_status_filter() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let uid = UserId("u1".into());
        let ticket = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "")
            .await
            .unwrap();
        update_ticket_status(&db, &ticket.id, &[TicketStatus::Open], TicketStatus::Closed)
            .await
            .unwrap();
        create_ticket_if_absent(&db, &uid, Handler::Counsellor, "")
            .await
            .unwrap();

        let all = list_tickets(&db, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let open = list_tickets(&db, Some(TicketStatus::Open)).await.unwrap();
        assert_eq!(open.len(), 1);
        let closed = list_tickets(&db, Some(TicketStatus::Closed)).await.unwrap();
        assert_eq!(closed.len(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_expected_list_is_a_no_op() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let uid = UserId("u1".into());
        let ticket = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "")
            .await
            .unwrap();

        let changed = update_ticket_status(&db, &ticket.id, &[], TicketStatus::Closed)
            .await
            .unwrap();
        assert!(!changed);

        db.close().await.unwrap();
    }
}
