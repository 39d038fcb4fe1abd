//! The outbound delivery boundary.
//!
//! The core hands fully formed [`Notice`] records to a [`Messenger`] and only
//! cares whether the recipient could be reached. `Unreachable` is terminal
//! for a session: the relay never retries direct-message delivery.

use async_trait::async_trait;
use thiserror::Error;

use cortado_shared::{Notice, UserId};

/// The recipient's direct channel rejected the delivery (messages blocked,
/// account gone, and so on).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("user {0} is unreachable for direct messages")]
pub struct Unreachable(pub UserId);

/// Delivers notices to a user's direct channel.
///
/// Implemented by the platform gateway; the core supplies the data, the
/// gateway renders and sends it.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, to: UserId, notice: &Notice) -> Result<(), Unreachable>;
}
