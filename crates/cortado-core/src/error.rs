//! Core error taxonomy.
//!
//! Every rejection a user can run into has its own variant with a specific,
//! user-facing `Display` message; the dispatch layer surfaces these verbatim.
//! [`CoreError::Store`] is the one internal fault and is the only variant a
//! renderer should replace with a generic apology.

use thiserror::Error;

use cortado_store::StoreError;

#[derive(Error, Debug)]
pub enum CoreError {
    // -- validation, rejected at the registry boundary --
    #[error("Chat requests can only be created from within a community group.")]
    MissingGroup,

    #[error("Please give your chat request a topic.")]
    EmptyTopic,

    #[error("That topic is too long (maximum {max} characters).")]
    TopicTooLong { max: usize },

    #[error("That description is too long (maximum {max} characters).")]
    DescriptionTooLong { max: usize },

    // -- state conflicts --
    #[error("You already have an open chat request. Cancel it before creating a new one.")]
    DuplicatePending,

    #[error("You are already in an active chat. End it before requesting a new one.")]
    RequesterInChat,

    #[error("That chat request is no longer available.")]
    StaleRequest,

    #[error("You cannot accept your own chat request.")]
    SelfAccept,

    #[error("You are already in an active chat. End it before accepting a new one.")]
    AccepterBusy,

    #[error("The requester is already in another chat. Try a different request.")]
    RequesterBusy,

    // -- delivery --
    #[error(
        "The chat could not be started because one of you is unreachable for direct messages."
    )]
    StartDeliveryFailed,

    // -- lifecycle --
    #[error("You don't have an active chat.")]
    NotInChat,

    #[error("You don't have an open chat request to cancel.")]
    NoOpenRequest,

    // -- internal --
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Whether the message is meant for the end user (as opposed to an
    /// internal fault that should be logged and replaced with a generic one).
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, CoreError::Store(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
