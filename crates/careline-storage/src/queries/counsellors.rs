// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counsellor registry and capacity operations.
//!
//! A counsellor handles at most one ticket at a time. Binding goes through
//! [`compare_and_set_counsellor_ticket`], a conditional UPDATE whose changed
//! row count decides the winner under concurrency.

use careline_core::{
    CarelineError, Counsellor, CounsellorId, SelectionStrategy, TicketId,
};
use rusqlite::params;

use crate::database::{ts_from_sql, Database};

pub(crate) fn row_to_counsellor(row: &rusqlite::Row) -> Result<Counsellor, rusqlite::Error> {
    Ok(Counsellor {
        id: CounsellorId(row.get(0)?),
        name: row.get(1)?,
        username: row.get(2)?,
        contact: row.get(3)?,
        current_ticket: row.get::<_, Option<String>>(4)?.map(TicketId),
        last_assigned_at: row
            .get::<_, Option<String>>(5)?
            .map(|raw| ts_from_sql(5, raw))
            .transpose()?,
    })
}

const COUNSELLOR_COLUMNS: &str = "id, name, username, contact, current_ticket, last_assigned_at";

/// Register a counsellor. New counsellors start unbound.
///
/// Fails with `Conflict` when the id or username is already registered.
pub async fn add_counsellor(db: &Database, counsellor: &Counsellor) -> Result<(), CarelineError> {
    let c = counsellor.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            match conn.execute(
                "INSERT INTO counsellors (id, name, username, contact) VALUES (?1, ?2, ?3, ?4)",
                params![c.id.0, c.name, c.username, c.contact],
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if !inserted {
        return Err(CarelineError::Conflict(format!(
            "counsellor id or username already registered: {}",
            counsellor.id
        )));
    }
    Ok(())
}

/// Remove a counsellor. Returns `false` if no such counsellor exists.
///
/// Fails with `Conflict` while the counsellor holds a ticket; release or
/// close the ticket first.
pub async fn remove_counsellor(db: &Database, id: &CounsellorId) -> Result<bool, CarelineError> {
    let id_owned = id.0.clone();
    // (removed, was_bound)
    let (removed, bound) = db
        .connection()
        .call(move |conn| {
            let current: Option<Option<String>> = match conn.query_row(
                "SELECT current_ticket FROM counsellors WHERE id = ?1",
                params![id_owned],
                |row| row.get(0),
            ) {
                Ok(v) => Some(v),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };

            match current {
                None => Ok((false, false)),
                Some(Some(_)) => Ok((false, true)),
                Some(None) => {
                    conn.execute("DELETE FROM counsellors WHERE id = ?1", params![id_owned])?;
                    Ok((true, false))
                }
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if bound {
        return Err(CarelineError::Conflict(format!(
            "counsellor {id} still holds a ticket"
        )));
    }
    Ok(removed)
}

/// Get a counsellor by ID.
pub async fn get_counsellor(
    db: &Database,
    id: &CounsellorId,
) -> Result<Option<Counsellor>, CarelineError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COUNSELLOR_COLUMNS} FROM counsellors WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_counsellor) {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All counsellors, ordered by ID.
pub async fn list_counsellors(db: &Database) -> Result<Vec<Counsellor>, CarelineError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COUNSELLOR_COLUMNS} FROM counsellors ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map([], row_to_counsellor)?;
            let mut counsellors = Vec::new();
            for row in rows {
                counsellors.push(row?);
            }
            Ok(counsellors)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unbound counsellors in assignment order.
///
/// `LowestId` orders by id; `RoundRobin` puts the least recently assigned
/// first (never-assigned counsellors lead, since NULL sorts first).
pub async fn available_counsellors(
    db: &Database,
    strategy: SelectionStrategy,
) -> Result<Vec<Counsellor>, CarelineError> {
    let order_by = match strategy {
        SelectionStrategy::LowestId => "id ASC",
        SelectionStrategy::RoundRobin => "last_assigned_at ASC, id ASC",
    };
    let sql = format!(
        "SELECT {COUNSELLOR_COLUMNS} FROM counsellors
         WHERE current_ticket IS NULL ORDER BY {order_by}"
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_counsellor)?;
            let mut counsellors = Vec::new();
            for row in rows {
                counsellors.push(row?);
            }
            Ok(counsellors)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The counsellor currently holding the given ticket, if any.
pub async fn counsellor_for_ticket(
    db: &Database,
    ticket_id: &TicketId,
) -> Result<Option<Counsellor>, CarelineError> {
    let ticket_id = ticket_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COUNSELLOR_COLUMNS} FROM counsellors WHERE current_ticket = ?1"
            ))?;
            match stmt.query_row(params![ticket_id], row_to_counsellor) {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Resolve a counsellor from one of their channel addresses.
///
/// Used to recognize inbound traffic from counsellors themselves (a reply
/// on their WhatsApp number, say) as distinct from service users.
pub async fn counsellor_by_channel(
    db: &Database,
    kind: &str,
    channel_id: &str,
) -> Result<Option<Counsellor>, CarelineError> {
    let kind = kind.to_string();
    let channel_id = channel_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.username, c.contact, c.current_ticket, c.last_assigned_at
                 FROM counsellors c
                 JOIN channels ch ON ch.counsellor_id = c.id
                 WHERE ch.kind = ?1 AND ch.channel_id = ?2
                 LIMIT 1",
            )?;
            match stmt.query_row(params![kind, channel_id], row_to_counsellor) {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Bind a ticket to the counsellor if, and only if, they are unbound.
///
/// A conditional UPDATE: the changed row count decides the race, so exactly
/// one of N concurrent binders wins. Winning stamps `last_assigned_at`.
pub async fn compare_and_set_counsellor_ticket(
    db: &Database,
    id: &CounsellorId,
    ticket_id: &TicketId,
) -> Result<bool, CarelineError> {
    let id = id.0.clone();
    let ticket_id = ticket_id.0.clone();
    db.connection()
        .call(move |conn| {
            let rows = conn.execute(
                "UPDATE counsellors
                 SET current_ticket = ?1,
                     last_assigned_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND current_ticket IS NULL",
                params![ticket_id, id],
            )?;
            Ok(rows == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unbind the counsellor's current ticket. Idempotent.
pub async fn release_counsellor_ticket(
    db: &Database,
    id: &CounsellorId,
) -> Result<(), CarelineError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE counsellors SET current_ticket = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tickets::create_ticket_if_absent;
    use crate::queries::users::upsert_user;
    use careline_core::{Handler, User, UserId};
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_counsellor(id: &str) -> Counsellor {
        Counsellor {
            id: CounsellorId(id.to_string()),
            name: format!("Counsellor {id}"),
            username: format!("user-{id}"),
            contact: format!("2783000{id}"),
            current_ticket: None,
            last_assigned_at: None,
        }
    }

    async fn make_ticket(db: &Database, user_id: &str) -> TicketId {
        upsert_user(db, &User::new(UserId(user_id.to_string()), "en".into()))
            .await
            .unwrap();
        create_ticket_if_absent(db, &UserId(user_id.to_string()), Handler::Counsellor, "")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn add_get_list_roundtrip() {
        let (db, _dir) = setup_db().await;
        add_counsellor(&db, &make_counsellor("c2")).await.unwrap();
        add_counsellor(&db, &make_counsellor("c1")).await.unwrap();

        let got = get_counsellor(&db, &CounsellorId("c1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.username, "user-c1");
        assert!(got.current_ticket.is_none());

        let all = list_counsellors(&db).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id.0, "c1");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let (db, _dir) = setup_db().await;
        add_counsellor(&db, &make_counsellor("c1")).await.unwrap();

        let err = add_counsellor(&db, &make_counsellor("c1")).await.unwrap_err();
        assert!(err.is_conflict());

        // Same username under a different id is also rejected.
        let mut impostor = make_counsellor("c9");
        impostor.username = "user-c1".into();
        let err = add_counsellor(&db, &impostor).await.unwrap_err();
        assert!(err.is_conflict());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cas_binds_once_and_releases_idempotently() {
        let (db, _dir) = setup_db().await;
        add_counsellor(&db, &make_counsellor("c1")).await.unwrap();
        let t1 = make_ticket(&db, "u1").await;
        let t2 = make_ticket(&db, "u2").await;
        let cid = CounsellorId("c1".into());

        assert!(compare_and_set_counsellor_ticket(&db, &cid, &t1).await.unwrap());
        // Already bound, the second bind loses.
        assert!(!compare_and_set_counsellor_ticket(&db, &cid, &t2).await.unwrap());

        let bound = get_counsellor(&db, &cid).await.unwrap().unwrap();
        assert_eq!(bound.current_ticket, Some(t1.clone()));
        assert!(bound.last_assigned_at.is_some());

        release_counsellor_ticket(&db, &cid).await.unwrap();
        release_counsellor_ticket(&db, &cid).await.unwrap();
        let freed = get_counsellor(&db, &cid).await.unwrap().unwrap();
        assert!(freed.current_ticket.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_binds_have_exactly_one_winner() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("cas.db");
        let db = Arc::new(Database::open(db_path.to_str().unwrap()).await.unwrap());
        add_counsellor(&db, &make_counsellor("c1")).await.unwrap();

        let mut tickets = Vec::new();
        for i in 0..8 {
            tickets.push(make_ticket(&db, &format!("u{i}")).await);
        }

        let mut handles = Vec::new();
        for ticket in tickets {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                compare_and_set_counsellor_ticket(&db, &CounsellorId("c1".into()), &ticket).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1, "exactly one concurrent bind must win");
    }

    #[tokio::test]
    async fn remove_bound_counsellor_is_conflict() {
        let (db, _dir) = setup_db().await;
        add_counsellor(&db, &make_counsellor("c1")).await.unwrap();
        let ticket = make_ticket(&db, "u1").await;
        let cid = CounsellorId("c1".into());
        compare_and_set_counsellor_ticket(&db, &cid, &ticket)
            .await
            .unwrap();

        let err = remove_counsellor(&db, &cid).await.unwrap_err();
        assert!(err.is_conflict());

        release_counsellor_ticket(&db, &cid).await.unwrap();
        assert!(remove_counsellor(&db, &cid).await.unwrap());
        assert!(!remove_counsellor(&db, &cid).await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn available_ordering_follows_strategy() {
        let (db, _dir) = setup_db().await;
        for id in ["c3", "c1", "c2"] {
            add_counsellor(&db, &make_counsellor(id)).await.unwrap();
        }

        let by_id = available_counsellors(&db, SelectionStrategy::LowestId)
            .await
            .unwrap();
        assert_eq!(
            by_id.iter().map(|c| c.id.0.as_str()).collect::<Vec<_>>(),
            ["c1", "c2", "c3"]
        );

        // Give c1 an assignment history; round robin now prefers the others.
        let ticket = make_ticket(&db, "u1").await;
        let c1 = CounsellorId("c1".into());
        compare_and_set_counsellor_ticket(&db, &c1, &ticket).await.unwrap();
        release_counsellor_ticket(&db, &c1).await.unwrap();

        let round_robin = available_counsellors(&db, SelectionStrategy::RoundRobin)
            .await
            .unwrap();
        assert_eq!(round_robin.len(), 3);
        assert_eq!(round_robin.last().map(|c| c.id.0.as_str()), Some("c1"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn counsellor_for_ticket_finds_holder() {
        let (db, _dir) = setup_db().await;
        add_counsellor(&db, &make_counsellor("c1")).await.unwrap();
        let ticket = make_ticket(&db, "u1").await;

        assert!(counsellor_for_ticket(&db, &ticket).await.unwrap().is_none());

        compare_and_set_counsellor_ticket(&db, &CounsellorId("c1".into()), &ticket)
            .await
            .unwrap();
        let holder = counsellor_for_ticket(&db, &ticket).await.unwrap().unwrap();
        assert_eq!(holder.id.0, "c1");

        db.close().await.unwrap();
    }
}
