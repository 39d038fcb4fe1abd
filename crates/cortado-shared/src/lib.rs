//! # cortado-shared
//!
//! Types shared by every Cortado crate: identifier newtypes, limits, and the
//! outbound notice records handed to the delivery layer.

pub mod constants;
pub mod notice;
pub mod types;

pub use notice::{Attachment, Notice};
pub use types::{ChatId, GroupId, MessageId, MessageRef, RequestId, UserId};
