// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message journal operations.
//!
//! Every inbound and outbound message lands here with a per-conversation
//! `seq`. Appending also extends the transcript of the user's non-closed
//! ticket in the same transaction, so the journal and the ticket never
//! disagree.

use careline_core::{CarelineError, MessageRecord, NewMessage, UserId};
use chrono::Utc;
use rusqlite::params;

use crate::database::{text_from_sql, ts_from_sql, ts_to_sql, Database};

fn row_to_record(row: &rusqlite::Row) -> Result<MessageRecord, rusqlite::Error> {
    Ok(MessageRecord {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        sender: row.get(2)?,
        recipient: row.get(3)?,
        kind: text_from_sql(4, row.get(4)?)?,
        source: row.get(5)?,
        content: row.get(6)?,
        seq: row.get(7)?,
        timestamp: ts_from_sql(8, row.get(8)?)?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, user_id, sender, recipient, kind, source, content, seq, timestamp";

/// Append a message to the conversation journal.
///
/// Assigns the next `seq` for the conversation, inserts the row, and
/// appends a transcript line to the user's non-closed ticket (if one
/// exists) in a single transaction.
pub async fn append_message(
    db: &Database,
    msg: NewMessage,
) -> Result<MessageRecord, CarelineError> {
    let timestamp = ts_to_sql(&Utc::now());
    let transcript_line = format!("{}\n", msg.transcript_line());

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE user_id = ?1",
                params![msg.user_id.0],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO messages (user_id, sender, recipient, kind, source, content, seq, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    msg.user_id.0,
                    msg.sender,
                    msg.recipient,
                    msg.kind.to_string(),
                    msg.source,
                    msg.content,
                    seq,
                    timestamp,
                ],
            )?;
            let id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE tickets SET transcript = transcript || ?1
                 WHERE user_id = ?2 AND status != 'closed'",
                params![transcript_line, msg.user_id.0],
            )?;

            let record = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
                ))?;
                stmt.query_row(params![id], row_to_record)?
            };

            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent messages of a conversation, oldest first.
pub async fn recent_messages_for_user(
    db: &Database,
    user_id: &UserId,
    limit: usize,
) -> Result<Vec<MessageRecord>, CarelineError> {
    let user_id = user_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![user_id, limit as i64], row_to_record)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tickets::{create_ticket_if_absent, get_ticket};
    use crate::queries::users::upsert_user;
    use careline_core::{Handler, MessageKind, User};
    use tempfile::tempdir;

    async fn setup_db_with_user(user_id: &str) -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        upsert_user(&db, &User::new(UserId(user_id.to_string()), "en".into()))
            .await
            .unwrap();
        (db, dir)
    }

    fn make_msg(user_id: &str, sender: &str, content: &str) -> NewMessage {
        NewMessage {
            user_id: UserId(user_id.to_string()),
            sender: sender.to_string(),
            recipient: "careline".to_string(),
            kind: MessageKind::Text,
            source: "whatsapp".to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn append_assigns_monotonic_seq_per_conversation() {
        let (db, _dir) = setup_db_with_user("u1").await;
        upsert_user(&db, &User::new(UserId("u2".into()), "en".into()))
            .await
            .unwrap();

        let a = append_message(&db, make_msg("u1", "u1", "first")).await.unwrap();
        let b = append_message(&db, make_msg("u1", "u1", "second")).await.unwrap();
        let other = append_message(&db, make_msg("u2", "u2", "hello")).await.unwrap();

        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 2);
        // Conversations do not share a sequence.
        assert_eq!(other.seq, 1);
        assert!(a.id < b.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn append_extends_active_ticket_transcript() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let uid = UserId("u1".into());
        let ticket = create_ticket_if_absent(&db, &uid, Handler::Counsellor, "u1: help\n")
            .await
            .unwrap();

        append_message(&db, make_msg("u1", "u1", "it is urgent"))
            .await
            .unwrap();

        let ticket = get_ticket(&db, &ticket.id).await.unwrap().unwrap();
        assert_eq!(ticket.transcript, "u1: help\nu1: it is urgent\n");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn append_without_ticket_only_journals() {
        let (db, _dir) = setup_db_with_user("u1").await;

        let record = append_message(&db, make_msg("u1", "u1", "just chatting"))
            .await
            .unwrap();
        assert_eq!(record.content, "just chatting");
        assert_eq!(record.kind, MessageKind::Text);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn recent_messages_returns_tail_oldest_first() {
        let (db, _dir) = setup_db_with_user("u1").await;

        for i in 0..5 {
            append_message(&db, make_msg("u1", "u1", &format!("msg {i}")))
                .await
                .unwrap();
        }

        let recent = recent_messages_for_user(&db, &UserId("u1".into()), 3)
            .await
            .unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "msg 2");
        assert_eq!(recent[2].content, "msg 4");
        assert!(recent[0].seq < recent[1].seq);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn recent_messages_empty_conversation() {
        let (db, _dir) = setup_db_with_user("u1").await;
        let recent = recent_messages_for_user(&db, &UserId("u1".into()), 10)
            .await
            .unwrap();
        assert!(recent.is_empty());
        db.close().await.unwrap();
    }
}
