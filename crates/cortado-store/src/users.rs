//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use cortado_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert a user on first sight, or refresh the display name of a known
    /// one. Cumulative statistics are never touched by the upsert.
    pub fn upsert_user(&self, id: UserId, display_name: &str) -> Result<User> {
        self.conn().execute(
            "INSERT INTO users (user_id, display_name, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name",
            params![id.0 as i64, display_name, Utc::now().to_rfc3339()],
        )?;
        self.get_user(id)
    }

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT user_id, display_name, total_chats, total_minutes, created_at
                 FROM users WHERE user_id = ?1",
                params![id.0 as i64],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fold a completed chat into a user's cumulative statistics.
    pub fn record_chat_completion(&self, id: UserId, minutes: i64) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users
             SET total_chats = total_chats + 1,
                 total_minutes = total_minutes + ?2
             WHERE user_id = ?1",
            params![id.0 as i64, minutes],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: i64 = row.get(0)?;
    let display_name: String = row.get(1)?;
    let total_chats: i64 = row.get(2)?;
    let total_minutes: i64 = row.get(3)?;
    let created_str: String = row.get(4)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: UserId(id as u64),
        display_name,
        total_chats,
        total_minutes,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_is_create_then_rename() {
        let db = Database::open_in_memory().unwrap();

        let created = db.upsert_user(UserId(1), "ada").unwrap();
        assert_eq!(created.display_name, "ada");
        assert_eq!(created.total_chats, 0);

        db.record_chat_completion(UserId(1), 12).unwrap();

        let renamed = db.upsert_user(UserId(1), "ada lovelace").unwrap();
        assert_eq!(renamed.display_name, "ada lovelace");
        // Stats survive the rename.
        assert_eq!(renamed.total_chats, 1);
        assert_eq!(renamed.total_minutes, 12);
    }

    #[test]
    fn completion_for_unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.record_chat_completion(UserId(99), 5),
            Err(StoreError::NotFound)
        ));
    }
}
