use serde::{Deserialize, Serialize};

/// A single chat message in a contact's history.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Locally generated identifier
    pub id: String,
    /// Display name of the sender
    pub from: String,
    /// Message body
    pub message: String,
    /// Epoch milliseconds at which the message was recorded locally
    pub timestamp: i64,
    /// Whether the local user authored the message
    #[serde(default)]
    pub own: bool,
}

/// A conversation partner and their message history.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub last_message: String,
    /// Epoch milliseconds of the most recent message
    pub last_message_time: i64,
    /// Messages received while the contact was not active
    pub unread: u32,
    pub messages: Vec<ChatMessage>,
}

/// Envelope the chat server uses for application messages.
///
/// The transport forwards payloads without schema enforcement; decoding this
/// envelope is the subscriber's validation step. Payloads that do not match
/// are ignored.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingChat {
    pub message: ChatBody,
}

/// Inner body of the chat envelope.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBody {
    pub from: String,
    pub message: String,
}

impl IncomingChat {
    /// Build the envelope for an outbound message.
    #[must_use]
    pub fn new(from: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: ChatBody {
                from: from.into(),
                message: message.into(),
            },
        }
    }
}
