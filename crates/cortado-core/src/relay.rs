//! The relay core.
//!
//! Owns the authoritative in-memory map of live pairings and drives the
//! per-user Idle -> Active -> Idle state machine: registering both sides when
//! a chat starts, routing direct messages between partners, and tearing the
//! pairing down on an explicit end or a delivery fault.
//!
//! Persistence rules worth calling out:
//! - every relayed message is appended to the ledger whether or not delivery
//!   succeeded — the ledger records "sent", not "received";
//! - the history row for an ended chat is written only when the guarded
//!   status transition on the chat row actually happened, so concurrent end
//!   paths cannot produce two rows;
//! - an unreachable partner is a terminal fault for the session, never
//!   retried.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use cortado_shared::{Attachment, ChatId, Notice, UserId};
use cortado_store::{Chat, StoreError};

use crate::error::Result;
use crate::messenger::Messenger;
use crate::session::{Occupied, Session, SessionMap};
use crate::SharedDb;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one inbound direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Forwarded to the partner and recorded in the ledger.
    Delivered,
    /// The sender has no live session; nothing happened.
    NotInChat,
    /// The partner was unreachable. The message is in the ledger and the
    /// chat was ended for both sides.
    DeliveryFailed,
}

/// What happened to an end-chat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    Ended(EndedChat),
    /// The caller had no live session — either they were never in a chat or
    /// the partner ended it first.
    NotInChat,
}

/// Summary of a concluded chat, handed back for rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndedChat {
    pub chat: ChatId,
    pub partner: UserId,
    pub topic: String,
    pub minutes: i64,
}

/// Why a chat could not be started.
#[derive(Debug, Error)]
pub enum StartChatError {
    /// A participant already has a live session.
    #[error(transparent)]
    Occupied(#[from] Occupied),

    /// A participant's direct channel rejected the start notice. Both
    /// registrations were rolled back.
    #[error("user {0} is unreachable for direct messages")]
    Unreachable(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Relay core
// ---------------------------------------------------------------------------

/// Routes direct messages between paired users and manages chat lifetimes.
pub struct RelayCore {
    sessions: SessionMap,
    db: SharedDb,
    messenger: Arc<dyn Messenger>,
}

impl RelayCore {
    pub fn new(db: SharedDb, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            sessions: SessionMap::new(),
            db,
            messenger,
        }
    }

    /// Register both participants of a freshly created chat and greet them.
    ///
    /// If either greeting cannot be delivered the registration of both sides
    /// is rolled back and the call fails: a chat never exists
    /// half-registered. The caller (the pairing resolver) owns the durable
    /// rollback.
    pub async fn start_chat(&self, chat: &Chat) -> std::result::Result<(), StartChatError> {
        self.sessions
            .insert_pair(chat.id, chat.requester, chat.accepter, chat.started_at)
            .await?;

        let (requester_name, accepter_name) = {
            let db = self.db.lock().await;
            (
                display_name(&db, chat.requester),
                display_name(&db, chat.accepter),
            )
        };

        for (recipient, partner, partner_name) in [
            (chat.requester, chat.accepter, &accepter_name),
            (chat.accepter, chat.requester, &requester_name),
        ] {
            let notice = Notice::ChatStarted {
                chat: chat.id,
                topic: chat.topic.clone(),
                partner,
                partner_name: partner_name.clone(),
            };
            if self.messenger.send(recipient, &notice).await.is_err() {
                warn!(
                    chat = %chat.id,
                    user = %recipient,
                    "cannot greet participant, rolling back chat registration"
                );
                self.sessions.remove_pair(chat.requester).await;
                return Err(StartChatError::Unreachable(recipient));
            }
        }

        info!(
            chat = %chat.id,
            requester = %chat.requester,
            accepter = %chat.accepter,
            topic = %chat.topic,
            "chat relay started"
        );
        Ok(())
    }

    /// Forward one direct message from `sender` to their partner.
    pub async fn relay_message(
        &self,
        sender: UserId,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<RelayOutcome> {
        let Some(session) = self.sessions.get(sender).await else {
            return Ok(RelayOutcome::NotInChat);
        };

        let sender_name = {
            let db = self.db.lock().await;
            display_name(&db, sender)
        };

        let notice = Notice::Relayed {
            chat: session.chat,
            sender,
            sender_name,
            text: text.to_string(),
            attachments: attachments.to_vec(),
        };
        let delivery = self.messenger.send(session.partner, &notice).await;

        // The ledger records the send attempt regardless of the outcome.
        {
            let db = self.db.lock().await;
            db.append_message(session.chat, sender, text, !attachments.is_empty())?;
        }

        match delivery {
            Ok(()) => Ok(RelayOutcome::Delivered),
            Err(_) => {
                warn!(
                    chat = %session.chat,
                    sender = %sender,
                    partner = %session.partner,
                    "partner unreachable, ending chat"
                );
                self.end_chat(sender, false).await?;
                Ok(RelayOutcome::DeliveryFailed)
            }
        }
    }

    /// End the caller's chat: unregister both sides, persist the outcome,
    /// and (unless `silent`) tell both participants how long it lasted.
    ///
    /// Idempotent from the caller's perspective: when two participants race,
    /// the second call finds no session and reports [`EndOutcome::NotInChat`].
    pub async fn end_chat(&self, user: UserId, silent: bool) -> Result<EndOutcome> {
        let Some(session) = self.sessions.remove_pair(user).await else {
            return Ok(EndOutcome::NotInChat);
        };

        let ended_at = Utc::now();
        let minutes = (ended_at - session.started_at).num_minutes().max(0);

        let topic = {
            let db = self.db.lock().await;
            let chat = db.get_chat(session.chat)?;
            if db.mark_chat_ended(session.chat, ended_at)? {
                db.insert_history(&chat, minutes, ended_at)?;
                db.record_chat_completion(chat.requester, minutes)?;
                db.record_chat_completion(chat.accepter, minutes)?;
            } else {
                // The durable row was already closed (e.g. by another
                // process); the cached session was stale. Skip the history
                // and stats writes so the chat is counted once.
                warn!(chat = %session.chat, "chat row already ended, skipping history write");
            }
            chat.topic
        };

        if !silent {
            let notice = Notice::ChatEnded {
                chat: session.chat,
                minutes,
            };
            for recipient in [user, session.partner] {
                if self.messenger.send(recipient, &notice).await.is_err() {
                    debug!(
                        chat = %session.chat,
                        user = %recipient,
                        "could not deliver end-of-chat notice"
                    );
                }
            }
        }

        info!(
            chat = %session.chat,
            user = %user,
            partner = %session.partner,
            minutes,
            "chat ended"
        );

        Ok(EndOutcome::Ended(EndedChat {
            chat: session.chat,
            partner: session.partner,
            topic,
            minutes,
        }))
    }

    /// Whether the user is in an active chat.
    ///
    /// Checks the session map first; on a miss, falls back to the durable
    /// store and reconstructs the caller's session entry from the chat row.
    /// The partner's entry is rebuilt by their own next lookup.
    pub async fn is_in_active_chat(&self, user: UserId) -> Result<bool> {
        if self.sessions.contains(user).await {
            return Ok(true);
        }

        let chat = {
            let db = self.db.lock().await;
            db.active_chat_for(user)?
        };

        let Some(chat) = chat else {
            return Ok(false);
        };
        let Some(partner) = chat.partner_of(user) else {
            return Ok(false);
        };

        debug!(chat = %chat.id, user = %user, "session reconstructed from durable chat");
        self.sessions
            .restore(
                user,
                Session {
                    chat: chat.id,
                    partner,
                    started_at: chat.started_at,
                },
            )
            .await;
        Ok(true)
    }

    /// The caller's live session, if any. Map-only; no durable fallback.
    pub async fn active_session(&self, user: UserId) -> Option<Session> {
        self.sessions.get(user).await
    }

    /// Number of registered participants (two per live chat).
    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    /// Drop every live session; part of process teardown.
    pub async fn shutdown(&self) {
        self.sessions.clear().await;
    }
}

/// Display name for notices; participants are upserted before pairing, so a
/// missing row only happens for store-level drift.
fn display_name(db: &cortado_store::Database, user: UserId) -> String {
    db.get_user(user)
        .map(|u| u.display_name)
        .unwrap_or_else(|_| "Unknown user".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::testing::RecordingMessenger;
    use crate::shared_db;
    use cortado_shared::GroupId;
    use cortado_store::Database;

    const GROUP: GroupId = GroupId(7);
    const ADA: UserId = UserId(1);
    const GRACE: UserId = UserId(2);

    struct Fixture {
        relay: RelayCore,
        messenger: Arc<RecordingMessenger>,
        db: SharedDb,
    }

    fn fixture() -> Fixture {
        let db = shared_db(Database::open_in_memory().unwrap());
        let messenger = Arc::new(RecordingMessenger::new());
        let relay = RelayCore::new(db.clone(), messenger.clone());
        Fixture {
            relay,
            messenger,
            db,
        }
    }

    /// Seed users, an accepted request, and an active chat row.
    async fn seeded_chat(f: &Fixture) -> Chat {
        let db = f.db.lock().await;
        db.upsert_user(ADA, "ada").unwrap();
        db.upsert_user(GRACE, "grace").unwrap();
        let request = db
            .insert_request(ADA, GROUP, "Rust vs Go", None, true)
            .unwrap();
        db.mark_request_accepted(request.id).unwrap();
        db.insert_chat(ADA, GRACE, request.id, GROUP, "Rust vs Go")
            .unwrap()
    }

    #[tokio::test]
    async fn start_then_end_round_trip() {
        let f = fixture();
        let chat = seeded_chat(&f).await;

        f.relay.start_chat(&chat).await.unwrap();
        assert!(f.relay.is_in_active_chat(ADA).await.unwrap());
        assert!(f.relay.is_in_active_chat(GRACE).await.unwrap());

        // Both sides were greeted with the topic.
        for user in [ADA, GRACE] {
            let greetings = f.messenger.sent_to(user);
            assert!(matches!(
                &greetings[0],
                Notice::ChatStarted { topic, .. } if topic == "Rust vs Go"
            ));
        }

        let outcome = f.relay.end_chat(ADA, false).await.unwrap();
        let EndOutcome::Ended(summary) = outcome else {
            panic!("expected the chat to end");
        };
        assert_eq!(summary.partner, GRACE);
        assert!(summary.minutes >= 0);

        assert!(!f.relay.is_in_active_chat(ADA).await.unwrap());
        assert!(!f.relay.is_in_active_chat(GRACE).await.unwrap());

        let db = f.db.lock().await;
        assert_eq!(db.count_history_for_chat(chat.id).unwrap(), 1);
        assert_eq!(db.get_user(ADA).unwrap().total_chats, 1);
        assert_eq!(db.get_user(GRACE).unwrap().total_chats, 1);
    }

    #[tokio::test]
    async fn end_chat_is_idempotent() {
        let f = fixture();
        let chat = seeded_chat(&f).await;
        f.relay.start_chat(&chat).await.unwrap();

        let first = f.relay.end_chat(ADA, true).await.unwrap();
        assert!(matches!(first, EndOutcome::Ended(_)));

        // The partner (or a repeat caller) observes the absence.
        let second = f.relay.end_chat(GRACE, true).await.unwrap();
        assert_eq!(second, EndOutcome::NotInChat);
        let third = f.relay.end_chat(ADA, true).await.unwrap();
        assert_eq!(third, EndOutcome::NotInChat);

        let db = f.db.lock().await;
        assert_eq!(db.count_history_for_chat(chat.id).unwrap(), 1);
    }

    #[tokio::test]
    async fn relay_delivers_and_records() {
        let f = fixture();
        let chat = seeded_chat(&f).await;
        f.relay.start_chat(&chat).await.unwrap();

        let outcome = f.relay.relay_message(GRACE, "hello", &[]).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Delivered);

        let received = f.messenger.sent_to(ADA);
        assert!(received.iter().any(|n| matches!(
            n,
            Notice::Relayed { sender, text, .. } if *sender == GRACE && text == "hello"
        )));

        {
            let db = f.db.lock().await;
            let stored = db.messages_for_chat(chat.id, 10, 0).unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].sender, GRACE);
            assert_eq!(stored[0].content, "hello");
            assert!(!stored[0].has_attachment);
        }

        // An attachment-only message keeps its flag through notice and
        // ledger.
        let attachment = Attachment {
            file_name: "sketch.png".into(),
            url: "https://cdn.example/sketch.png".into(),
        };
        let outcome = f
            .relay
            .relay_message(ADA, "", std::slice::from_ref(&attachment))
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Delivered);
        assert!(f.messenger.sent_to(GRACE).iter().any(|n| matches!(
            n,
            Notice::Relayed { attachments, .. }
                if attachments.len() == 1 && attachments[0] == attachment
        )));

        let db = f.db.lock().await;
        let stored = db.messages_for_chat(chat.id, 10, 0).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].has_attachment);
        assert_eq!(stored[0].content, "");
    }

    #[tokio::test]
    async fn relay_without_session_is_a_no_op() {
        let f = fixture();
        seeded_chat(&f).await;

        // Chat row exists but nobody registered a session and the sender is
        // user 3, who is in no chat at all.
        let outcome = f
            .relay
            .relay_message(UserId(3), "anyone there?", &[])
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::NotInChat);
        assert!(f.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn unreachable_partner_tears_the_session_down() {
        let f = fixture();
        let chat = seeded_chat(&f).await;
        f.relay.start_chat(&chat).await.unwrap();

        f.messenger.make_unreachable(ADA);

        let outcome = f
            .relay
            .relay_message(GRACE, "you still there?", &[])
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::DeliveryFailed);

        // Both sessions are gone, durably too.
        assert!(!f.relay.is_in_active_chat(GRACE).await.unwrap());
        assert!(!f.relay.is_in_active_chat(ADA).await.unwrap());

        let db = f.db.lock().await;
        // The undelivered message is still in the ledger ("sent", not
        // "received") and the chat ended exactly once.
        assert_eq!(db.count_messages_for_chat(chat.id).unwrap(), 1);
        assert_eq!(db.count_history_for_chat(chat.id).unwrap(), 1);
    }

    #[tokio::test]
    async fn unreachable_participant_rolls_back_start() {
        let f = fixture();
        let chat = seeded_chat(&f).await;

        f.messenger.make_unreachable(GRACE);

        let err = f.relay.start_chat(&chat).await.unwrap_err();
        assert!(matches!(err, StartChatError::Unreachable(u) if u == GRACE));

        // Neither side stays half-registered.
        assert_eq!(f.relay.session_count().await, 0);
    }

    #[tokio::test]
    async fn reconstruction_keeps_the_original_start_time() {
        let f = fixture();
        let chat = seeded_chat(&f).await;
        f.relay.start_chat(&chat).await.unwrap();

        // Simulate a restart: the map is gone, the store survives.
        let restarted = RelayCore::new(f.db.clone(), f.messenger.clone());
        assert_eq!(restarted.session_count().await, 0);

        assert!(restarted.is_in_active_chat(GRACE).await.unwrap());
        let session = restarted.active_session(GRACE).await.unwrap();
        assert_eq!(session.chat, chat.id);
        assert_eq!(session.partner, ADA);
        // The start time is read back from the chat row, not approximated.
        assert_eq!(session.started_at, chat.started_at);

        // Teardown drops the reconstructed session.
        restarted.shutdown().await;
        assert_eq!(restarted.session_count().await, 0);
    }
}
