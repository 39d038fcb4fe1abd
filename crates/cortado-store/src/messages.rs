//! The append-only message ledger.

use chrono::{DateTime, Utc};
use rusqlite::params;

use cortado_shared::{ChatId, MessageId, UserId};

use crate::database::Database;
use crate::error::Result;
use crate::models::StoredMessage;

impl Database {
    /// Append a relayed message to the ledger.
    ///
    /// The ledger records "sent", not "received": the relay appends a row for
    /// every message it attempted to forward, delivered or not.
    pub fn append_message(
        &self,
        chat: ChatId,
        sender: UserId,
        content: &str,
        has_attachment: bool,
    ) -> Result<MessageId> {
        self.conn().execute(
            "INSERT INTO messages (chat_id, sender_id, content, has_attachment, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chat.0,
                sender.0 as i64,
                content,
                has_attachment,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(MessageId(self.conn().last_insert_rowid()))
    }

    /// Messages of one chat, most recent first.
    pub fn messages_for_chat(
        &self,
        chat: ChatId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT message_id, chat_id, sender_id, content, has_attachment, sent_at
             FROM messages
             WHERE chat_id = ?1
             ORDER BY sent_at DESC, message_id DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![chat.0, limit, offset], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Number of ledger rows for one chat.
    pub fn count_messages_for_chat(&self, chat: ChatId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            params![chat.0],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Map a `rusqlite::Row` to a [`StoredMessage`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let id: i64 = row.get(0)?;
    let chat: i64 = row.get(1)?;
    let sender: i64 = row.get(2)?;
    let content: String = row.get(3)?;
    let has_attachment: bool = row.get(4)?;
    let sent_str: String = row.get(5)?;

    let sent_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&sent_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StoredMessage {
        id: MessageId(id),
        chat: ChatId(chat),
        sender: UserId(sender as u64),
        content,
        has_attachment,
        sent_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortado_shared::GroupId;

    fn seeded() -> (Database, ChatId) {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(UserId(1), "ada").unwrap();
        db.upsert_user(UserId(2), "grace").unwrap();
        let request = db
            .insert_request(UserId(1), GroupId(7), "topic", None, true)
            .unwrap();
        db.mark_request_accepted(request.id).unwrap();
        let chat = db
            .insert_chat(UserId(1), UserId(2), request.id, GroupId(7), "topic")
            .unwrap();
        (db, chat.id)
    }

    #[test]
    fn append_and_page() {
        let (db, chat) = seeded();

        db.append_message(chat, UserId(1), "hello", false).unwrap();
        db.append_message(chat, UserId(2), "hi there", false).unwrap();
        db.append_message(chat, UserId(1), "", true).unwrap();

        assert_eq!(db.count_messages_for_chat(chat).unwrap(), 3);

        let recent = db.messages_for_chat(chat, 2, 0).unwrap();
        assert_eq!(recent.len(), 2);
        // Most recent first: the attachment-only message.
        assert!(recent[0].has_attachment);
        assert_eq!(recent[0].content, "");
        assert_eq!(recent[1].content, "hi there");

        let older = db.messages_for_chat(chat, 2, 2).unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].content, "hello");
    }
}
