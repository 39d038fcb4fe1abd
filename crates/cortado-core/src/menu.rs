//! The menu model.
//!
//! The main menu a user sees depends only on their presence triple: whether
//! they own a pending request, whether they are in an active chat, and how
//! many requests are open for browsing. [`menu_for`] maps that triple to one
//! of four named variants, each a fixed declarative button layout — the
//! rendering layer draws a variant, it never assembles buttons one by one.
//!
//! Inbound interactions arrive as [`MenuAction`] values and are dispatched
//! by [`ChatService`](crate::service::ChatService).

use serde::{Deserialize, Serialize};

use cortado_shared::RequestId;

use crate::registry::Visibility;

/// The state triple that picks a menu variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPresence {
    pub has_pending_request: bool,
    pub in_active_chat: bool,
    pub open_request_count: u64,
}

/// One button slot of the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuButton {
    RequestChat,
    ViewRequests,
    CancelRequest,
    EndChat,
    MyStats,
    Leaderboard,
}

impl MenuButton {
    /// Label shown on the rendered button.
    pub fn label(&self) -> &'static str {
        match self {
            MenuButton::RequestChat => "Request a chat",
            MenuButton::ViewRequests => "View requests",
            MenuButton::CancelRequest => "Cancel my request",
            MenuButton::EndChat => "End chat",
            MenuButton::MyStats => "My stats",
            MenuButton::Leaderboard => "Leaderboard",
        }
    }
}

/// The four menu layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuVariant {
    /// Idle, nothing to browse.
    Fresh,
    /// Idle with open requests to look at.
    Browse { open_requests: u64 },
    /// Owns a pending request.
    Waiting,
    /// Currently paired.
    InChat,
}

impl MenuVariant {
    /// The fixed button layout of this variant.
    pub fn buttons(&self) -> &'static [MenuButton] {
        match self {
            MenuVariant::Fresh => &[
                MenuButton::RequestChat,
                MenuButton::MyStats,
                MenuButton::Leaderboard,
            ],
            MenuVariant::Browse { .. } => &[
                MenuButton::RequestChat,
                MenuButton::ViewRequests,
                MenuButton::MyStats,
                MenuButton::Leaderboard,
            ],
            MenuVariant::Waiting => &[
                MenuButton::ViewRequests,
                MenuButton::CancelRequest,
                MenuButton::MyStats,
                MenuButton::Leaderboard,
            ],
            MenuVariant::InChat => &[
                MenuButton::EndChat,
                MenuButton::MyStats,
                MenuButton::Leaderboard,
            ],
        }
    }
}

/// Pick the menu variant for a presence triple. Pure and total.
///
/// An active chat dominates a pending request: the pair can only coexist
/// through store-level drift, and a user mid-chat needs the end button more
/// than the cancel button.
pub fn menu_for(presence: UserPresence) -> MenuVariant {
    if presence.in_active_chat {
        MenuVariant::InChat
    } else if presence.has_pending_request {
        MenuVariant::Waiting
    } else if presence.open_request_count > 0 {
        MenuVariant::Browse {
            open_requests: presence.open_request_count,
        }
    } else {
        MenuVariant::Fresh
    }
}

/// An inbound menu interaction, already parsed and validated by the
/// dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuAction {
    /// Open (or refresh) the main menu.
    Menu,
    CreateRequest {
        topic: String,
        description: Option<String>,
        visibility: Visibility,
    },
    ListRequests,
    Accept { request: RequestId },
    CancelRequest,
    EndChat,
    Stats,
    Leaderboard,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(pending: bool, in_chat: bool, open: u64) -> UserPresence {
        UserPresence {
            has_pending_request: pending,
            in_active_chat: in_chat,
            open_request_count: open,
        }
    }

    #[test]
    fn variant_selection_table() {
        assert_eq!(menu_for(presence(false, false, 0)), MenuVariant::Fresh);
        assert_eq!(
            menu_for(presence(false, false, 3)),
            MenuVariant::Browse { open_requests: 3 }
        );
        assert_eq!(menu_for(presence(true, false, 3)), MenuVariant::Waiting);
        assert_eq!(menu_for(presence(false, true, 3)), MenuVariant::InChat);
        // An active chat dominates a stray pending request.
        assert_eq!(menu_for(presence(true, true, 0)), MenuVariant::InChat);
    }

    #[test]
    fn layouts_offer_the_right_verbs() {
        assert!(MenuVariant::InChat.buttons().contains(&MenuButton::EndChat));
        assert!(!MenuVariant::InChat.buttons().contains(&MenuButton::RequestChat));

        assert!(MenuVariant::Waiting
            .buttons()
            .contains(&MenuButton::CancelRequest));
        assert!(!MenuVariant::Waiting
            .buttons()
            .contains(&MenuButton::RequestChat));

        assert!(MenuVariant::Fresh.buttons().contains(&MenuButton::RequestChat));
        assert!(!MenuVariant::Fresh.buttons().contains(&MenuButton::ViewRequests));

        // Every layout lets the user check stats and the leaderboard, and
        // every button renders a non-empty label.
        for variant in [
            MenuVariant::Fresh,
            MenuVariant::Browse { open_requests: 1 },
            MenuVariant::Waiting,
            MenuVariant::InChat,
        ] {
            assert!(variant.buttons().contains(&MenuButton::MyStats));
            assert!(variant.buttons().contains(&MenuButton::Leaderboard));
            for button in variant.buttons() {
                assert!(!button.label().is_empty());
            }
        }
    }
}
