//! Message types exchanged with the host chat platform.

use serde::{Deserialize, Serialize};

/// Incoming chat message, normalized by the host channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID (channel-specific), carried in the command span
    pub id: String,
    /// Opaque reply address of the conversation the message came from.
    /// Persisted as-is for the post-restart notification.
    pub origin: String,
    /// Sender identity, matched against the risk-operator list
    pub sender_id: String,
    /// Whether the host platform grants the sender the administrator tier
    #[serde(default)]
    pub is_admin: bool,
    /// Plain text of the message
    pub text: String,
}

impl ChannelMessage {
    /// Build a text message with a fresh ID.
    pub fn text(
        origin: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            origin: origin.into(),
            sender_id: sender_id.into(),
            is_admin: false,
            text: text.into(),
        }
    }

    /// Mark the sender as holding the administrator tier.
    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

/// Outgoing message to send back through the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target reply address
    pub origin: String,
    /// Message content
    pub content: OutgoingContent,
}

/// Outgoing message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingContent {
    /// Plain text
    Text { text: String },
}

impl OutgoingMessage {
    /// Plain-text message to `origin`.
    pub fn text(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            content: OutgoingContent::Text { text: text.into() },
        }
    }

    /// Text body of the message.
    pub fn as_text(&self) -> &str {
        match &self.content {
            OutgoingContent::Text { text } => text,
        }
    }
}
