//! The pairing resolver.
//!
//! Matches an accepting user to a pending request: one request transitions
//! pending -> accepted and exactly one chat is created, or neither happens.
//! The store offers no cross-row transaction, so the atomicity is logical —
//! the guarded accepted-transition arbitrates races, and every later failure
//! compensates by closing the chat row and reopening the request.

use std::sync::Arc;

use tracing::{info, warn};

use chrono::Utc;
use cortado_shared::{RequestId, UserId};
use cortado_store::{Chat, RequestStatus};

use crate::error::{CoreError, Result};
use crate::relay::{RelayCore, StartChatError};
use crate::SharedDb;

/// Resolves accepts into live chats.
pub struct PairingResolver {
    db: SharedDb,
    relay: Arc<RelayCore>,
}

impl PairingResolver {
    pub fn new(db: SharedDb, relay: Arc<RelayCore>) -> Self {
        Self { db, relay }
    }

    /// Accept a pending request on behalf of `accepter`.
    ///
    /// Rejection reasons, in priority order: the request is gone or no
    /// longer pending; the accepter owns it; the accepter is already in a
    /// chat; the requester meanwhile entered one. On success the relay has
    /// greeted both sides and the accepter's own pending request (if any)
    /// has been auto-cancelled.
    pub async fn accept(&self, request_id: RequestId, accepter: UserId) -> Result<Chat> {
        let request = {
            let db = self.db.lock().await;
            match db.get_request(request_id) {
                Ok(request) => request,
                Err(cortado_store::StoreError::NotFound) => return Err(CoreError::StaleRequest),
                Err(e) => return Err(e.into()),
            }
        };

        if request.status != RequestStatus::Pending {
            return Err(CoreError::StaleRequest);
        }
        if request.owner == accepter {
            return Err(CoreError::SelfAccept);
        }
        if self.relay.is_in_active_chat(accepter).await? {
            return Err(CoreError::AccepterBusy);
        }
        if self.relay.is_in_active_chat(request.owner).await? {
            return Err(CoreError::RequesterBusy);
        }

        let chat = {
            let db = self.db.lock().await;

            // The guarded transition is the race arbiter: if another accept
            // won in between, no row changes and the request is stale.
            if !db.mark_request_accepted(request.id)? {
                return Err(CoreError::StaleRequest);
            }

            match db.insert_chat(
                request.owner,
                accepter,
                request.id,
                request.group,
                &request.topic,
            ) {
                Ok(chat) => chat,
                Err(e) => {
                    // Leave no accepted request without a chat.
                    if !db.reopen_request(request.id).unwrap_or(false) {
                        warn!(request = %request.id, "could not reopen request after failed chat insert");
                    }
                    return Err(e.into());
                }
            }
        };

        if let Err(e) = self.relay.start_chat(&chat).await {
            self.rollback(&chat).await;
            return Err(match e {
                StartChatError::Occupied(occupied) => {
                    if occupied.0 == accepter {
                        CoreError::AccepterBusy
                    } else {
                        CoreError::RequesterBusy
                    }
                }
                StartChatError::Unreachable(_) => CoreError::StartDeliveryFailed,
                StartChatError::Store(e) => e.into(),
            });
        }

        // One active engagement per user across both roles: accepting
        // retires the accepter's own standing request. The requester's other
        // state is never touched.
        {
            let db = self.db.lock().await;
            if let Some(own) = db.open_request_for(accepter)? {
                if db.mark_request_cancelled(own.id, accepter)? {
                    info!(
                        request = %own.id,
                        user = %accepter,
                        "auto-cancelled accepter's own pending request"
                    );
                }
            }
        }

        info!(
            chat = %chat.id,
            request = %request.id,
            requester = %request.owner,
            accepter = %accepter,
            "request accepted, chat created"
        );
        Ok(chat)
    }

    /// Compensate for a failed start: close the chat row (no history row is
    /// written — the chat never ran) and put the request back on the board.
    async fn rollback(&self, chat: &Chat) {
        let db = self.db.lock().await;
        match db.mark_chat_ended(chat.id, Utc::now()) {
            Ok(true) => {}
            Ok(false) => warn!(chat = %chat.id, "rollback found the chat already ended"),
            Err(e) => warn!(chat = %chat.id, error = %e, "could not close chat during rollback"),
        }
        match db.reopen_request(chat.request) {
            Ok(true) => info!(request = %chat.request, "request reopened after failed start"),
            Ok(false) => warn!(request = %chat.request, "rollback found the request not accepted"),
            Err(e) => {
                warn!(request = %chat.request, error = %e, "could not reopen request during rollback")
            }
        }
    }
}
