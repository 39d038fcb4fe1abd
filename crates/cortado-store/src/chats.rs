//! CRUD operations for [`Chat`] records and the append-only chat history.

use chrono::{DateTime, Utc};
use rusqlite::params;

use cortado_shared::{ChatId, GroupId, RequestId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Chat, ChatStatus};

const CHAT_COLUMNS: &str = "chat_id, requester_id, accepter_id, request_id, group_id, topic,
    status, started_at, ended_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new active chat, copying the topic from the request so later
    /// request mutation cannot corrupt history.
    ///
    /// The partial unique indexes on active chats reject a participant who is
    /// already active in the same role, regardless of caller checks.
    pub fn insert_chat(
        &self,
        requester: UserId,
        accepter: UserId,
        request: RequestId,
        group: GroupId,
        topic: &str,
    ) -> Result<Chat> {
        self.conn().execute(
            "INSERT INTO chats (requester_id, accepter_id, request_id, group_id, topic, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6)",
            params![
                requester.0 as i64,
                accepter.0 as i64,
                request.0,
                group.0 as i64,
                topic,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = ChatId(self.conn().last_insert_rowid());
        self.get_chat(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single chat by id.
    pub fn get_chat(&self, id: ChatId) -> Result<Chat> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE chat_id = ?1"),
                params![id.0],
                row_to_chat,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// The chat a user is currently active in, in either role.
    pub fn active_chat_for(&self, user: UserId) -> Result<Option<Chat>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {CHAT_COLUMNS} FROM chats
                 WHERE (requester_id = ?1 OR accepter_id = ?1) AND status = 'active'"
            ),
            params![user.0 as i64],
            row_to_chat,
        );

        match result {
            Ok(chat) => Ok(Some(chat)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// Number of currently active chats.
    pub fn count_active_chats(&self) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM chats WHERE status = 'active'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Status transition
    // ------------------------------------------------------------------

    /// active -> ended. Returns `false` when the chat was already ended (or
    /// never existed), so callers can gate the one-history-row guarantee on
    /// the transition actually happening.
    pub fn mark_chat_ended(&self, id: ChatId, ended_at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats SET status = 'ended', ended_at = ?2
             WHERE chat_id = ?1 AND status = 'active'",
            params![id.0, ended_at.to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Append the history row for an ended chat. Never updated afterwards.
    pub fn insert_history(
        &self,
        chat: &Chat,
        duration_minutes: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO chat_history
                 (chat_id, requester_id, accepter_id, group_id, topic,
                  duration_minutes, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                chat.id.0,
                chat.requester.0 as i64,
                chat.accepter.0 as i64,
                chat.group.0 as i64,
                chat.topic,
                duration_minutes,
                chat.started_at.to_rfc3339(),
                ended_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Number of history rows recorded for one chat. Test and audit helper;
    /// the relay guarantees this is at most one.
    pub fn count_history_for_chat(&self, id: ChatId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM chat_history WHERE chat_id = ?1",
            params![id.0],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Map a `rusqlite::Row` to a [`Chat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let id: i64 = row.get(0)?;
    let requester: i64 = row.get(1)?;
    let accepter: i64 = row.get(2)?;
    let request: i64 = row.get(3)?;
    let group: i64 = row.get(4)?;
    let topic: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let started_str: String = row.get(7)?;
    let ended_str: Option<String> = row.get(8)?;

    let status = ChatStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown chat status: {status_str}").into(),
        )
    })?;

    let started_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&started_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let ended_at = ended_str
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        8,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()?;

    Ok(Chat {
        id: ChatId(id),
        requester: UserId(requester as u64),
        accepter: UserId(accepter as u64),
        request: RequestId(request),
        group: GroupId(group as u64),
        topic,
        status,
        started_at,
        ended_at,
    })
}
