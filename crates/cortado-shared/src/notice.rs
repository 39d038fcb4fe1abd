//! Outbound notice records.
//!
//! A [`Notice`] is the data handed to the delivery collaborator whenever the
//! relay needs to reach a participant's direct channel. Rendering a notice
//! into platform markup is the delivery layer's job; the core only decides
//! *what* is said, never *how* it looks.

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, UserId};

/// Everything the relay ever says to a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Notice {
    /// Both sides were paired; sent to each participant once.
    ChatStarted {
        chat: ChatId,
        topic: String,
        partner: UserId,
        partner_name: String,
    },

    /// A message forwarded from the partner.
    Relayed {
        chat: ChatId,
        sender: UserId,
        sender_name: String,
        text: String,
        attachments: Vec<Attachment>,
    },

    /// The chat ended; carries the computed duration.
    ChatEnded { chat: ChatId, minutes: i64 },

    /// The user messaged the relay while not paired with anyone.
    NotInChat,
}

/// A file forwarded alongside a relayed message.
///
/// The relay never downloads attachment bytes; it forwards the hosted URL and
/// records only the fact that an attachment was present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_roundtrip() {
        let notice = Notice::Relayed {
            chat: ChatId(3),
            sender: UserId(9),
            sender_name: "ada".into(),
            text: "hello".into(),
            attachments: vec![Attachment {
                file_name: "sketch.png".into(),
                url: "https://cdn.example/sketch.png".into(),
            }],
        };

        let json = serde_json::to_string(&notice).unwrap();
        let back: Notice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, notice);
    }
}
