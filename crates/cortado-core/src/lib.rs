//! # cortado-core
//!
//! The matchmaking and relay core: the request registry, the pairing
//! resolver, the relay state machine with its session map, and the menu
//! controller that dispatches inbound actions.
//!
//! The core never talks to a chat platform directly. Outbound delivery goes
//! through the [`Messenger`] trait and inbound events arrive as
//! [`MenuAction`] values (or direct-message relays) through [`ChatService`];
//! rendering is a pure function of the returned [`Reply`] records. Durable
//! state lives in [`cortado_store`] behind a shared async lock.

pub mod error;
pub mod menu;
pub mod messenger;
pub mod registry;
pub mod relay;
pub mod resolver;
pub mod service;
pub mod session;

use std::sync::Arc;

use tokio::sync::Mutex;

use cortado_store::Database;

pub use error::CoreError;
pub use menu::{menu_for, MenuAction, MenuButton, MenuVariant, UserPresence};
pub use messenger::{Messenger, Unreachable};
pub use registry::{RequestRegistry, Visibility};
pub use relay::{EndOutcome, EndedChat, RelayCore, RelayOutcome, StartChatError};
pub use resolver::PairingResolver;
pub use service::{Actor, ChatService, Reply};
pub use session::{Session, SessionMap};

/// The store handle as shared by every core component.
///
/// The store itself is synchronous; the async lock makes each store call a
/// single suspension point and serialises access across handlers.
pub type SharedDb = Arc<Mutex<Database>>;

/// Wrap a freshly opened [`Database`] for use by the core components.
pub fn shared_db(db: Database) -> SharedDb {
    Arc::new(Mutex::new(db))
}
