//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a rendering layer without further mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cortado_shared::{ChatId, GroupId, MessageId, MessageRef, RequestId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user. Created on first interaction, mutated on chat completion,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    /// Number of completed chats the user took part in.
    pub total_chats: i64,
    /// Cumulative chat time in whole minutes.
    pub total_minutes: i64,
    /// Timestamp when this user was first seen.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`Request`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }
}

/// A standing offer by one user to be matched for a topical chat.
///
/// Immutable once non-pending, except for the announcement reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub owner: UserId,
    /// The community group the request was posted from.
    pub group: GroupId,
    pub topic: String,
    pub description: Option<String>,
    /// Whether the request is visible outside its origin group.
    pub is_public: bool,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// The public announcement post, recorded after the fact so the post can
    /// be edited when the request leaves the pending state.
    pub announcement: Option<MessageRef>,
}

/// Query scope for listing open requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Every open request of one group, public or not.
    Local(GroupId),
    /// Public requests across all groups.
    Global,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`Chat`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Active,
    Ended,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Active => "active",
            ChatStatus::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ChatStatus::Active),
            "ended" => Some(ChatStatus::Ended),
            _ => None,
        }
    }
}

/// An active or concluded pairing between two users.
///
/// The topic is copied from the request at creation so later request mutation
/// cannot corrupt history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub requester: UserId,
    pub accepter: UserId,
    pub request: RequestId,
    pub group: GroupId,
    pub topic: String,
    pub status: ChatStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Chat {
    /// The other participant, if `user` is one of the two.
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        if user == self.requester {
            Some(self.accepter)
        } else if user == self.accepter {
            Some(self.requester)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Chat history
// ---------------------------------------------------------------------------

/// One row per ended chat; the durable aggregate basis for statistics and the
/// leaderboard. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatHistoryEntry {
    pub id: i64,
    pub chat: ChatId,
    pub requester: UserId,
    pub accepter: UserId,
    pub group: GroupId,
    pub topic: String,
    pub duration_minutes: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single relayed message in the append-only ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub chat: ChatId,
    pub sender: UserId,
    /// May be empty for attachment-only messages.
    pub content: String,
    pub has_attachment: bool,
    pub sent_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Per-user statistics, derived from the chat history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    pub user: UserId,
    pub display_name: String,
    pub total_chats: i64,
    pub total_minutes: i64,
    pub chats_initiated: i64,
    pub chats_accepted: i64,
    pub unique_partners: i64,
    pub longest_minutes: i64,
}

/// One leaderboard row: users ranked by completed chats, then total time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub user: UserId,
    pub display_name: String,
    pub total_chats: i64,
    pub total_minutes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("open"), None);

        for status in [ChatStatus::Active, ChatStatus::Ended] {
            assert_eq!(ChatStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn partner_of_resolves_both_sides() {
        let chat = Chat {
            id: ChatId(1),
            requester: UserId(10),
            accepter: UserId(20),
            request: RequestId(1),
            group: GroupId(99),
            topic: "Rust vs Go".into(),
            status: ChatStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
        };

        assert_eq!(chat.partner_of(UserId(10)), Some(UserId(20)));
        assert_eq!(chat.partner_of(UserId(20)), Some(UserId(10)));
        assert_eq!(chat.partner_of(UserId(30)), None);
    }
}
