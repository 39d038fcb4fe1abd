//! Aggregate queries: per-user statistics and the leaderboard.
//!
//! Both are computed from `chat_history`, the append-only aggregate basis.
//! The counters on the `users` row are folded in at chat completion and act
//! as a cheap display shortcut; the history remains authoritative.

use rusqlite::params;

use cortado_shared::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::{LeaderboardRow, UserStats};

impl Database {
    /// Statistics for one user. `NotFound` if the user has never interacted.
    pub fn user_stats(&self, user: UserId) -> Result<UserStats> {
        let record = self.get_user(user)?;
        let id = user.0 as i64;

        let (total_chats, total_minutes, longest_minutes): (i64, i64, i64) =
            self.conn().query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(duration_minutes), 0),
                        COALESCE(MAX(duration_minutes), 0)
                 FROM chat_history
                 WHERE requester_id = ?1 OR accepter_id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let chats_initiated: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM chat_history WHERE requester_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        let chats_accepted: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM chat_history WHERE accepter_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        let unique_partners: i64 = self.conn().query_row(
            "SELECT COUNT(DISTINCT CASE
                        WHEN requester_id = ?1 THEN accepter_id
                        ELSE requester_id
                    END)
             FROM chat_history
             WHERE requester_id = ?1 OR accepter_id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        Ok(UserStats {
            user,
            display_name: record.display_name,
            total_chats,
            total_minutes,
            chats_initiated,
            chats_accepted,
            unique_partners,
            longest_minutes,
        })
    }

    /// Users with at least one completed chat, ranked by chat count and then
    /// cumulative minutes, both descending.
    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.user_id,
                    u.display_name,
                    COUNT(h.history_id)                  AS chat_count,
                    COALESCE(SUM(h.duration_minutes), 0) AS total_minutes
             FROM users u
             JOIN (SELECT history_id, requester_id AS user_id, duration_minutes
                   FROM chat_history
                   UNION ALL
                   SELECT history_id, accepter_id AS user_id, duration_minutes
                   FROM chat_history) h
               ON u.user_id = h.user_id
             GROUP BY u.user_id, u.display_name
             ORDER BY chat_count DESC, total_minutes DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            let id: i64 = row.get(0)?;
            Ok(LeaderboardRow {
                user: UserId(id as u64),
                display_name: row.get(1)?,
                total_chats: row.get(2)?,
                total_minutes: row.get(3)?,
            })
        })?;

        let mut leaderboard = Vec::new();
        for row in rows {
            leaderboard.push(row?);
        }
        Ok(leaderboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::Utc;
    use cortado_shared::GroupId;

    /// Run one full request -> chat -> history cycle between two users.
    fn complete_chat(db: &Database, requester: UserId, accepter: UserId, minutes: i64) {
        let request = db
            .insert_request(requester, GroupId(7), "topic", None, true)
            .unwrap();
        db.mark_request_accepted(request.id).unwrap();
        let chat = db
            .insert_chat(requester, accepter, request.id, GroupId(7), "topic")
            .unwrap();
        let now = Utc::now();
        db.mark_chat_ended(chat.id, now).unwrap();
        db.insert_history(&chat, minutes, now).unwrap();
        db.record_chat_completion(requester, minutes).unwrap();
        db.record_chat_completion(accepter, minutes).unwrap();
    }

    #[test]
    fn stats_for_unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.user_stats(UserId(1)), Err(StoreError::NotFound)));
    }

    #[test]
    fn stats_aggregate_both_roles() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(UserId(1), "ada").unwrap();
        db.upsert_user(UserId(2), "grace").unwrap();
        db.upsert_user(UserId(3), "alan").unwrap();

        complete_chat(&db, UserId(1), UserId(2), 30);
        complete_chat(&db, UserId(2), UserId(1), 10);
        complete_chat(&db, UserId(3), UserId(1), 5);

        let stats = db.user_stats(UserId(1)).unwrap();
        assert_eq!(stats.total_chats, 3);
        assert_eq!(stats.total_minutes, 45);
        assert_eq!(stats.chats_initiated, 1);
        assert_eq!(stats.chats_accepted, 2);
        assert_eq!(stats.unique_partners, 2);
        assert_eq!(stats.longest_minutes, 30);

        // The display counters on the users row agree with the history.
        let user = db.get_user(UserId(1)).unwrap();
        assert_eq!(user.total_chats, stats.total_chats);
        assert_eq!(user.total_minutes, stats.total_minutes);
    }

    #[test]
    fn leaderboard_orders_by_count_then_minutes() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(UserId(1), "ada").unwrap();
        db.upsert_user(UserId(2), "grace").unwrap();
        db.upsert_user(UserId(3), "alan").unwrap();
        db.upsert_user(UserId(4), "mary").unwrap();

        // grace: 3 chats / 45 min; ada: 2 chats / 40 min; alan: 1 chat / 5 min.
        complete_chat(&db, UserId(1), UserId(2), 30);
        complete_chat(&db, UserId(2), UserId(1), 10);
        complete_chat(&db, UserId(3), UserId(2), 5);

        let rows = db.leaderboard(10).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].display_name, "grace"); // 3 chats
        assert_eq!(rows[0].total_chats, 3);
        assert_eq!(rows[1].display_name, "ada"); // 2 chats
        assert_eq!(rows[2].display_name, "alan"); // 1 chat

        // mary never chatted and stays off the board.
        assert!(rows.iter().all(|r| r.display_name != "mary"));

        // Limit is honored.
        assert_eq!(db.leaderboard(2).unwrap().len(), 2);
    }
}
