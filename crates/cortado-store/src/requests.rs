//! CRUD operations for [`Request`] records.
//!
//! Status transitions are guarded in SQL: the `UPDATE` statements match on
//! the expected current status and report whether a row actually changed, so
//! callers can detect lost races without a read-modify-write cycle.

use chrono::{DateTime, Utc};
use rusqlite::params;

use cortado_shared::{GroupId, MessageRef, RequestId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ListScope, Request, RequestStatus};

const REQUEST_COLUMNS: &str = "request_id, user_id, group_id, topic, description, is_public,
    status, created_at, announce_channel_id, announce_message_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new pending request and return the stored row.
    ///
    /// The partial unique index on pending requests makes a second pending
    /// request per user fail at the store level regardless of caller checks.
    pub fn insert_request(
        &self,
        owner: UserId,
        group: GroupId,
        topic: &str,
        description: Option<&str>,
        is_public: bool,
    ) -> Result<Request> {
        self.conn().execute(
            "INSERT INTO requests (user_id, group_id, topic, description, is_public, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
            params![
                owner.0 as i64,
                group.0 as i64,
                topic,
                description,
                is_public,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = RequestId(self.conn().last_insert_rowid());
        self.get_request(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single request by id.
    pub fn get_request(&self, id: RequestId) -> Result<Request> {
        self.conn()
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE request_id = ?1"),
                params![id.0],
                row_to_request,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// The user's pending request, if any.
    pub fn open_request_for(&self, owner: UserId) -> Result<Option<Request>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM requests
                 WHERE user_id = ?1 AND status = 'pending'"
            ),
            params![owner.0 as i64],
            row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// List open requests, newest first.
    ///
    /// A local scope returns every open request of that group, public or not;
    /// the global scope returns public requests only.
    pub fn list_open_requests(
        &self,
        scope: ListScope,
        exclude: Option<UserId>,
    ) -> Result<Vec<Request>> {
        let mut sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE status = 'pending'"
        );
        let mut args: Vec<i64> = Vec::new();

        match scope {
            ListScope::Local(group) => {
                args.push(group.0 as i64);
                sql.push_str(&format!(" AND group_id = ?{}", args.len()));
            }
            ListScope::Global => {
                sql.push_str(" AND is_public = 1");
            }
        }

        if let Some(user) = exclude {
            args.push(user.0 as i64);
            sql.push_str(&format!(" AND user_id != ?{}", args.len()));
        }

        sql.push_str(" ORDER BY created_at DESC, request_id DESC");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), row_to_request)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// Count open requests visible under the given scope.
    pub fn count_open_requests(&self, scope: ListScope) -> Result<u64> {
        let count: i64 = match scope {
            ListScope::Local(group) => self.conn().query_row(
                "SELECT COUNT(*) FROM requests
                 WHERE status = 'pending' AND group_id = ?1",
                params![group.0 as i64],
                |row| row.get(0),
            )?,
            ListScope::Global => self.conn().query_row(
                "SELECT COUNT(*) FROM requests
                 WHERE status = 'pending' AND is_public = 1",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Status transitions
    // ------------------------------------------------------------------

    /// pending -> accepted. Returns `false` when the request was no longer
    /// pending (or never existed); this is the race arbiter for accepts.
    pub fn mark_request_accepted(&self, id: RequestId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE requests SET status = 'accepted'
             WHERE request_id = ?1 AND status = 'pending'",
            params![id.0],
        )?;
        Ok(affected > 0)
    }

    /// pending -> cancelled, owner-guarded. Cancelling a non-pending or
    /// foreign request changes nothing and reports `false`.
    pub fn mark_request_cancelled(&self, id: RequestId, owner: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE requests SET status = 'cancelled'
             WHERE request_id = ?1 AND user_id = ?2 AND status = 'pending'",
            params![id.0, owner.0 as i64],
        )?;
        Ok(affected > 0)
    }

    /// accepted -> pending; the compensation path when a pairing is rolled
    /// back after the chat could not be started.
    pub fn reopen_request(&self, id: RequestId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE requests SET status = 'pending'
             WHERE request_id = ?1 AND status = 'accepted'",
            params![id.0],
        )?;
        Ok(affected > 0)
    }

    /// Record where the public announcement for this request was posted.
    /// The only mutation permitted on a non-pending request.
    pub fn set_request_announcement(&self, id: RequestId, post: MessageRef) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE requests
             SET announce_channel_id = ?2, announce_message_id = ?3
             WHERE request_id = ?1",
            params![id.0, post.channel as i64, post.message as i64],
        )?;
        Ok(affected > 0)
    }
}

/// Map a `rusqlite::Row` to a [`Request`].
fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<Request> {
    let id: i64 = row.get(0)?;
    let owner: i64 = row.get(1)?;
    let group: i64 = row.get(2)?;
    let topic: String = row.get(3)?;
    let description: Option<String> = row.get(4)?;
    let is_public: bool = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_str: String = row.get(7)?;
    let announce_channel: Option<i64> = row.get(8)?;
    let announce_message: Option<i64> = row.get(9)?;

    let status = RequestStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown request status: {status_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let announcement = match (announce_channel, announce_message) {
        (Some(channel), Some(message)) => Some(MessageRef {
            channel: channel as u64,
            message: message as u64,
        }),
        _ => None,
    };

    Ok(Request {
        id: RequestId(id),
        owner: UserId(owner as u64),
        group: GroupId(group as u64),
        topic,
        description,
        is_public,
        status,
        created_at,
        announcement,
    })
}
