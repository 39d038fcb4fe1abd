//! The request registry.
//!
//! Creates, cancels, and lists pending match requests, and enforces the
//! boundary rules: validated input, at most one open request per user, and
//! no new request while a chat is live. Everything past this boundary can
//! assume well-formed requests.

use tracing::info;

use cortado_shared::constants::{DESCRIPTION_MAX_LEN, TOPIC_MAX_LEN};
use cortado_shared::{GroupId, MessageRef, RequestId, UserId};
use cortado_store::{ListScope, Request, RequestStatus};

use crate::error::{CoreError, Result};
use crate::menu::UserPresence;
use crate::SharedDb;

/// Who may see a request outside its origin group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed only inside the origin group.
    LocalOnly,
    /// Listed across groups.
    Global,
}

impl Visibility {
    fn is_public(self) -> bool {
        matches!(self, Visibility::Global)
    }
}

/// Registry over pending match requests.
pub struct RequestRegistry {
    db: SharedDb,
}

impl RequestRegistry {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Create a new pending request for `user`.
    ///
    /// Validation happens here so it never reaches the relay: a missing
    /// group context, an empty topic, or an over-length field each get their
    /// own rejection. State conflicts (an existing pending request, a live
    /// chat) are checked against the durable store, which is authoritative.
    pub async fn create_request(
        &self,
        user: UserId,
        group: Option<GroupId>,
        topic: &str,
        description: Option<&str>,
        visibility: Visibility,
    ) -> Result<Request> {
        let group = group.ok_or(CoreError::MissingGroup)?;

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CoreError::EmptyTopic);
        }
        if topic.chars().count() > TOPIC_MAX_LEN {
            return Err(CoreError::TopicTooLong { max: TOPIC_MAX_LEN });
        }

        let description = description.map(str::trim).filter(|d| !d.is_empty());
        if let Some(d) = description {
            if d.chars().count() > DESCRIPTION_MAX_LEN {
                return Err(CoreError::DescriptionTooLong {
                    max: DESCRIPTION_MAX_LEN,
                });
            }
        }

        let db = self.db.lock().await;

        if db.open_request_for(user)?.is_some() {
            return Err(CoreError::DuplicatePending);
        }
        if db.active_chat_for(user)?.is_some() {
            return Err(CoreError::RequesterInChat);
        }

        let request = db.insert_request(user, group, topic, description, visibility.is_public())?;

        info!(
            request = %request.id,
            user = %user,
            group = %group,
            public = request.is_public,
            "chat request created"
        );
        Ok(request)
    }

    /// Cancel a specific pending request. Only the owner may cancel;
    /// cancelling a non-pending or foreign request changes nothing and is
    /// reported as a failure.
    pub async fn cancel_request(&self, request: RequestId, acting_user: UserId) -> Result<()> {
        let cancelled = {
            let db = self.db.lock().await;
            db.mark_request_cancelled(request, acting_user)?
        };
        if !cancelled {
            return Err(CoreError::NoOpenRequest);
        }

        info!(request = %request, user = %acting_user, "chat request cancelled");
        Ok(())
    }

    /// Cancel whatever pending request the user owns, returning it (with the
    /// announcement reference, so the public post can be edited).
    pub async fn cancel_open_request(&self, user: UserId) -> Result<Request> {
        let db = self.db.lock().await;
        let Some(mut request) = db.open_request_for(user)? else {
            return Err(CoreError::NoOpenRequest);
        };
        db.mark_request_cancelled(request.id, user)?;
        request.status = RequestStatus::Cancelled;
        drop(db);

        info!(request = %request.id, user = %user, "chat request cancelled");
        Ok(request)
    }

    /// Open requests under the given scope, newest first. Read-only.
    pub async fn list_pending(
        &self,
        scope: ListScope,
        exclude: Option<UserId>,
    ) -> Result<Vec<Request>> {
        let db = self.db.lock().await;
        Ok(db.list_open_requests(scope, exclude)?)
    }

    /// The user's pending request, if any.
    pub async fn open_request_for(&self, user: UserId) -> Result<Option<Request>> {
        let db = self.db.lock().await;
        Ok(db.open_request_for(user)?)
    }

    /// Number of open requests under the given scope.
    pub async fn open_request_count(&self, scope: ListScope) -> Result<u64> {
        let db = self.db.lock().await;
        Ok(db.count_open_requests(scope)?)
    }

    /// Record where a request's public announcement was posted. The only
    /// mutation allowed on a request that has left the pending state.
    pub async fn set_announcement(&self, request: RequestId, post: MessageRef) -> Result<bool> {
        let db = self.db.lock().await;
        Ok(db.set_request_announcement(request, post)?)
    }

    /// The presence triple that drives menu rendering.
    pub async fn presence_for(&self, user: UserId, scope: ListScope) -> Result<UserPresence> {
        let db = self.db.lock().await;
        Ok(UserPresence {
            has_pending_request: db.open_request_for(user)?.is_some(),
            in_active_chat: db.active_chat_for(user)?.is_some(),
            open_request_count: db.count_open_requests(scope)?,
        })
    }
}
