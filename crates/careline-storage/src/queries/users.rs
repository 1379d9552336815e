// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User CRUD operations.

use careline_core::{CarelineError, Handler, User, UserId};
use rusqlite::params;

use crate::database::{text_from_sql, ts_from_sql, ts_to_sql, Database};

pub(crate) fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserId(row.get(0)?),
        handler: text_from_sql(1, row.get(1)?)?,
        language: row.get(2)?,
        gender: row.get(3)?,
        age_range: row.get(4)?,
        created_at: ts_from_sql(5, row.get(5)?)?,
        updated_at: ts_from_sql(6, row.get(6)?)?,
    })
}

const USER_COLUMNS: &str = "id, handler, language, gender, age_range, created_at, updated_at";

/// Get a user by ID.
pub async fn get_user(db: &Database, id: &UserId) -> Result<Option<User>, CarelineError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_user);
            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a user, or refresh the profile fields of an existing one.
///
/// Creation is idempotent: if the row already exists its `handler` is
/// preserved and only language/gender/age_range/updated_at are refreshed.
/// Returns the row as stored.
pub async fn upsert_user(db: &Database, user: &User) -> Result<User, CarelineError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, handler, language, gender, age_range, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     language = excluded.language,
                     gender = excluded.gender,
                     age_range = excluded.age_range,
                     updated_at = excluded.updated_at",
                params![
                    user.id.0,
                    user.handler.to_string(),
                    user.language,
                    user.gender,
                    user.age_range,
                    ts_to_sql(&user.created_at),
                    ts_to_sql(&user.updated_at),
                ],
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
            ))?;
            stmt.query_row(params![user.id.0], row_to_user)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Switch a user's handler (bot vs counsellor).
pub async fn set_user_handler(
    db: &Database,
    id: &UserId,
    handler: Handler,
) -> Result<(), CarelineError> {
    let id_owned = id.0.clone();
    let rows = db
        .connection()
        .call(move |conn| {
            let rows = conn.execute(
                "UPDATE users SET handler = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![handler.to_string(), id_owned],
            )?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if rows == 0 {
        return Err(CarelineError::NotFound {
            entity: "user",
            id: id.0.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn upsert_and_get_user_roundtrips() {
        let (db, _dir) = setup_db().await;
        let user = User::new(UserId("27820001111".into()), "en".into());

        let stored = upsert_user(&db, &user).await.unwrap();
        assert_eq!(stored.id, user.id);
        assert_eq!(stored.handler, Handler::Bot);

        let retrieved = get_user(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, user.id);
        assert_eq!(retrieved.language, "en");
        assert!(retrieved.gender.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_user_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = get_user(&db, &UserId("nobody".into())).await.unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_preserves_handler_of_existing_user() {
        let (db, _dir) = setup_db().await;
        let user = User::new(UserId("27820001111".into()), "en".into());
        upsert_user(&db, &user).await.unwrap();

        set_user_handler(&db, &user.id, Handler::Counsellor)
            .await
            .unwrap();

        // A second create attempt for the same sender must not reset routing.
        let again = upsert_user(&db, &User::new(user.id.clone(), "fr".into()))
            .await
            .unwrap();
        assert_eq!(again.handler, Handler::Counsellor);
        assert_eq!(again.language, "fr");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn set_handler_on_missing_user_is_not_found() {
        let (db, _dir) = setup_db().await;
        let err = set_user_handler(&db, &UserId("ghost".into()), Handler::Bot)
            .await
            .unwrap_err();
        assert!(matches!(err, CarelineError::NotFound { entity: "user", .. }));
        db.close().await.unwrap();
    }
}
