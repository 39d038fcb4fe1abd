//! The in-memory session map.
//!
//! A [`Session`] is the live record of an active chat's pairing, used for
//! O(1) relay routing. The map is a cache of the durable active-chat fact,
//! not the source of truth: entries are reconstructable from the store after
//! a restart (see [`RelayCore::is_in_active_chat`]).
//!
//! All read-modify-write sequences happen under one mutex acquisition and
//! never hold the guard across an await point, so a pair of entries is
//! inserted or removed atomically with respect to every other handler.
//!
//! [`RelayCore::is_in_active_chat`]: crate::relay::RelayCore::is_in_active_chat

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use cortado_shared::{ChatId, UserId};

/// One user's half of a live pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub chat: ChatId,
    pub partner: UserId,
    /// Wall-clock start of the chat, copied from the chat row so a
    /// reconstructed session keeps the original start time.
    pub started_at: DateTime<Utc>,
}

/// A participant of the pair already has a live session.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("user {0} already has a live session")]
pub struct Occupied(pub UserId);

/// Concurrency-safe user → session map.
#[derive(Default)]
pub struct SessionMap {
    inner: Mutex<HashMap<UserId, Session>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register both sides of a chat in one atomic step.
    ///
    /// Fails without touching the map when either participant already has a
    /// session.
    pub async fn insert_pair(
        &self,
        chat: ChatId,
        requester: UserId,
        accepter: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<(), Occupied> {
        let mut map = self.inner.lock().await;
        if map.contains_key(&requester) {
            return Err(Occupied(requester));
        }
        if map.contains_key(&accepter) {
            return Err(Occupied(accepter));
        }
        map.insert(
            requester,
            Session {
                chat,
                partner: accepter,
                started_at,
            },
        );
        map.insert(
            accepter,
            Session {
                chat,
                partner: requester,
                started_at,
            },
        );
        Ok(())
    }

    /// Re-insert a single reconstructed entry. A racing entry for the same
    /// user wins; the restore is then a no-op.
    pub async fn restore(&self, user: UserId, session: Session) {
        let mut map = self.inner.lock().await;
        map.entry(user).or_insert(session);
    }

    /// Remove a user's session together with the partner's, returning the
    /// caller's half. `None` when the user has no session — the idempotence
    /// anchor for `end_chat`.
    pub async fn remove_pair(&self, user: UserId) -> Option<Session> {
        let mut map = self.inner.lock().await;
        let session = map.remove(&user)?;
        // The partner entry may be missing when only one side was
        // reconstructed after a restart.
        map.remove(&session.partner);
        Some(session)
    }

    pub async fn get(&self, user: UserId) -> Option<Session> {
        self.inner.lock().await.get(&user).cloned()
    }

    pub async fn contains(&self, user: UserId) -> bool {
        self.inner.lock().await.contains_key(&user)
    }

    /// Number of registered participants (two per live chat).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Drop every session; part of process teardown.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}
