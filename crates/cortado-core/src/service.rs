//! The menu controller.
//!
//! [`ChatService`] is the single entry point the dispatch layer calls into:
//! it upserts the acting user, routes a [`MenuAction`] to the registry,
//! resolver, or relay, and hands back a typed [`Reply`] record for the
//! rendering collaborator. It also owns the inbound direct-message path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cortado_shared::constants::DEFAULT_LEADERBOARD_LIMIT;
use cortado_shared::{Attachment, GroupId, Notice, UserId};
use cortado_store::{Chat, LeaderboardRow, ListScope, Request, UserStats};

use crate::error::{CoreError, Result};
use crate::menu::{menu_for, MenuAction, MenuVariant};
use crate::messenger::Messenger;
use crate::registry::RequestRegistry;
use crate::relay::{EndOutcome, EndedChat, RelayCore, RelayOutcome};
use crate::resolver::PairingResolver;
use crate::SharedDb;

/// The user behind an inbound event, as reported by the dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user: UserId,
    pub display_name: String,
    /// The group the event came from; `None` for direct-channel events.
    pub group: Option<GroupId>,
}

impl Actor {
    pub fn new(user: UserId, display_name: impl Into<String>, group: Option<GroupId>) -> Self {
        Self {
            user,
            display_name: display_name.into(),
            group,
        }
    }
}

/// The data record a successful action hands to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Menu { variant: MenuVariant },
    RequestCreated { request: Request },
    RequestList { requests: Vec<Request> },
    RequestCancelled { request: Request },
    ChatStarted { chat: Chat },
    ChatEnded { summary: EndedChat },
    Stats { stats: UserStats },
    Leaderboard { rows: Vec<LeaderboardRow> },
}

/// Owns the core components and dispatches inbound actions to them.
pub struct ChatService {
    db: SharedDb,
    registry: RequestRegistry,
    resolver: PairingResolver,
    relay: Arc<RelayCore>,
    messenger: Arc<dyn Messenger>,
}

impl ChatService {
    /// Wire the core together around a store handle and a delivery gateway.
    pub fn new(db: SharedDb, messenger: Arc<dyn Messenger>) -> Self {
        let relay = Arc::new(RelayCore::new(db.clone(), messenger.clone()));
        Self {
            registry: RequestRegistry::new(db.clone()),
            resolver: PairingResolver::new(db.clone(), relay.clone()),
            relay,
            messenger,
            db,
        }
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    pub fn relay(&self) -> &Arc<RelayCore> {
        &self.relay
    }

    /// Handle one menu interaction.
    pub async fn handle(&self, actor: &Actor, action: MenuAction) -> Result<Reply> {
        self.upsert_actor(actor).await?;
        debug!(user = %actor.user, ?action, "dispatching menu action");

        match action {
            MenuAction::Menu => {
                let presence = self
                    .registry
                    .presence_for(actor.user, self.scope_for(actor))
                    .await?;
                Ok(Reply::Menu {
                    variant: menu_for(presence),
                })
            }

            MenuAction::CreateRequest {
                topic,
                description,
                visibility,
            } => {
                let request = self
                    .registry
                    .create_request(
                        actor.user,
                        actor.group,
                        &topic,
                        description.as_deref(),
                        visibility,
                    )
                    .await?;
                Ok(Reply::RequestCreated { request })
            }

            MenuAction::ListRequests => {
                let requests = self
                    .registry
                    .list_pending(self.scope_for(actor), Some(actor.user))
                    .await?;
                Ok(Reply::RequestList { requests })
            }

            MenuAction::Accept { request } => {
                let chat = self.resolver.accept(request, actor.user).await?;
                Ok(Reply::ChatStarted { chat })
            }

            MenuAction::CancelRequest => {
                let request = self.registry.cancel_open_request(actor.user).await?;
                Ok(Reply::RequestCancelled { request })
            }

            MenuAction::EndChat => match self.relay.end_chat(actor.user, false).await? {
                EndOutcome::Ended(summary) => Ok(Reply::ChatEnded { summary }),
                EndOutcome::NotInChat => Err(CoreError::NotInChat),
            },

            MenuAction::Stats => {
                let stats = {
                    let db = self.db.lock().await;
                    db.user_stats(actor.user)?
                };
                Ok(Reply::Stats { stats })
            }

            MenuAction::Leaderboard => {
                let rows = {
                    let db = self.db.lock().await;
                    db.leaderboard(DEFAULT_LEADERBOARD_LIMIT)?
                };
                Ok(Reply::Leaderboard { rows })
            }
        }
    }

    /// Handle one inbound direct message.
    ///
    /// Relays it when the sender is paired (reconstructing the session from
    /// the store if needed); otherwise sends the not-in-chat pointer back,
    /// best effort.
    pub async fn handle_direct_message(
        &self,
        actor: &Actor,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<RelayOutcome> {
        self.upsert_actor(actor).await?;

        // Touch the durable fallback first so a relay after a restart finds
        // its session again.
        if !self.relay.is_in_active_chat(actor.user).await? {
            if self
                .messenger
                .send(actor.user, &Notice::NotInChat)
                .await
                .is_err()
            {
                debug!(user = %actor.user, "could not deliver not-in-chat pointer");
            }
            return Ok(RelayOutcome::NotInChat);
        }

        self.relay.relay_message(actor.user, text, attachments).await
    }

    async fn upsert_actor(&self, actor: &Actor) -> Result<()> {
        let db = self.db.lock().await;
        db.upsert_user(actor.user, &actor.display_name)?;
        Ok(())
    }

    fn scope_for(&self, actor: &Actor) -> ListScope {
        match actor.group {
            Some(group) => ListScope::Local(group),
            None => ListScope::Global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::testing::RecordingMessenger;
    use crate::registry::Visibility;
    use crate::shared_db;
    use cortado_store::Database;

    const GROUP: GroupId = GroupId(7);

    struct Fixture {
        service: ChatService,
        messenger: Arc<RecordingMessenger>,
    }

    fn fixture() -> Fixture {
        let db = shared_db(Database::open_in_memory().unwrap());
        let messenger = Arc::new(RecordingMessenger::new());
        Fixture {
            service: ChatService::new(db, messenger.clone()),
            messenger,
        }
    }

    fn ada() -> Actor {
        Actor::new(UserId(1), "ada", Some(GROUP))
    }

    fn grace() -> Actor {
        Actor::new(UserId(2), "grace", Some(GROUP))
    }

    fn create_action(topic: &str) -> MenuAction {
        MenuAction::CreateRequest {
            topic: topic.into(),
            description: None,
            visibility: Visibility::Global,
        }
    }

    #[tokio::test]
    async fn full_lifecycle_through_the_menu() {
        let f = fixture();

        // Ada's menu starts fresh.
        let reply = f.service.handle(&ada(), MenuAction::Menu).await.unwrap();
        assert_eq!(
            reply,
            Reply::Menu {
                variant: MenuVariant::Fresh
            }
        );

        // Ada posts a request and is now waiting.
        let Reply::RequestCreated { request } = f
            .service
            .handle(&ada(), create_action("Rust vs Go"))
            .await
            .unwrap()
        else {
            panic!("expected RequestCreated");
        };
        let reply = f.service.handle(&ada(), MenuAction::Menu).await.unwrap();
        assert_eq!(
            reply,
            Reply::Menu {
                variant: MenuVariant::Waiting
            }
        );

        // Grace can browse and sees exactly Ada's request.
        let reply = f.service.handle(&grace(), MenuAction::Menu).await.unwrap();
        assert_eq!(
            reply,
            Reply::Menu {
                variant: MenuVariant::Browse { open_requests: 1 }
            }
        );
        let Reply::RequestList { requests } = f
            .service
            .handle(&grace(), MenuAction::ListRequests)
            .await
            .unwrap()
        else {
            panic!("expected RequestList");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, request.id);

        // Grace accepts; both menus flip to in-chat.
        let Reply::ChatStarted { chat } = f
            .service
            .handle(&grace(), MenuAction::Accept { request: request.id })
            .await
            .unwrap()
        else {
            panic!("expected ChatStarted");
        };
        for actor in [ada(), grace()] {
            let reply = f.service.handle(&actor, MenuAction::Menu).await.unwrap();
            assert_eq!(
                reply,
                Reply::Menu {
                    variant: MenuVariant::InChat
                }
            );
        }

        // A direct message from Grace reaches Ada.
        let outcome = f
            .service
            .handle_direct_message(&grace(), "hello", &[])
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Delivered);
        assert!(f.messenger.sent_to(UserId(1)).iter().any(|n| matches!(
            n,
            Notice::Relayed { text, .. } if text == "hello"
        )));

        // Ada ends the chat; stats count it for both.
        let Reply::ChatEnded { summary } =
            f.service.handle(&ada(), MenuAction::EndChat).await.unwrap()
        else {
            panic!("expected ChatEnded");
        };
        assert_eq!(summary.chat, chat.id);
        assert_eq!(summary.partner, UserId(2));
        assert!(summary.minutes >= 0);

        let Reply::Stats { stats } = f.service.handle(&grace(), MenuAction::Stats).await.unwrap()
        else {
            panic!("expected Stats");
        };
        assert_eq!(stats.total_chats, 1);
        assert_eq!(stats.chats_accepted, 1);

        let Reply::Leaderboard { rows } = f
            .service
            .handle(&ada(), MenuAction::Leaderboard)
            .await
            .unwrap()
        else {
            panic!("expected Leaderboard");
        };
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_request_leaves_the_first_standing() {
        let f = fixture();

        f.service
            .handle(&ada(), create_action("first topic"))
            .await
            .unwrap();
        let second = f.service.handle(&ada(), create_action("second topic")).await;
        assert!(matches!(second, Err(CoreError::DuplicatePending)));

        let Reply::RequestList { requests } = f
            .service
            .handle(&grace(), MenuAction::ListRequests)
            .await
            .unwrap()
        else {
            panic!("expected RequestList");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].topic, "first topic");
    }

    #[tokio::test]
    async fn cancel_and_end_report_their_absence() {
        let f = fixture();

        let cancel = f
            .service
            .handle(&ada(), MenuAction::CancelRequest)
            .await
            .unwrap_err();
        assert!(matches!(cancel, CoreError::NoOpenRequest));
        // Rejections carry their own user-facing message.
        assert!(cancel.is_user_facing());

        assert!(matches!(
            f.service.handle(&ada(), MenuAction::EndChat).await,
            Err(CoreError::NotInChat)
        ));
    }

    #[tokio::test]
    async fn direct_message_while_idle_gets_the_pointer() {
        let f = fixture();

        let outcome = f
            .service
            .handle_direct_message(&ada(), "anyone?", &[])
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::NotInChat);
        assert_eq!(f.messenger.sent_to(UserId(1)), vec![Notice::NotInChat]);
    }

    #[tokio::test]
    async fn accepting_from_a_direct_channel_works_without_a_group() {
        let f = fixture();
        f.service
            .handle(&ada(), create_action("topic"))
            .await
            .unwrap();

        // Grace accepts from a DM context (no group): the accept itself is
        // group-free; only request creation demands one.
        let dm_grace = Actor::new(UserId(2), "grace", None);
        let open = f
            .service
            .registry()
            .open_request_for(UserId(1))
            .await
            .unwrap()
            .unwrap();
        let reply = f
            .service
            .handle(&dm_grace, MenuAction::Accept { request: open.id })
            .await
            .unwrap();
        assert!(matches!(reply, Reply::ChatStarted { .. }));

        // Creating one from a DM is rejected with the specific reason.
        let f2 = fixture();
        let dm_ada = Actor::new(UserId(1), "ada", None);
        assert!(matches!(
            f2.service.handle(&dm_ada, create_action("topic")).await,
            Err(CoreError::MissingGroup)
        ));
    }
}
