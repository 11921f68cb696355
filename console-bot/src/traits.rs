//! Channel traits at the boundary with the host chat platform.

use crate::message::{ChannelMessage, OutgoingMessage};
use async_trait::async_trait;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Message send failed: {0}")]
    SendFailed(String),

    /// The platform adapter behind the address has not started yet.
    #[error("Channel not ready")]
    NotReady,
}

/// Anything that can deliver a message to a reply address.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a message, returning the channel's message ID.
    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String>;
}

/// Channel adapter trait.
///
/// Implement this trait to run the command adapter on a messaging channel.
#[async_trait]
pub trait Channel: MessageSender {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Initialize the channel (connect, authenticate, etc.).
    async fn init(&mut self) -> ChannelResult<()>;

    /// Start listening for incoming messages, calling `callback` for each.
    async fn listen<F>(&self, callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static;

    /// Check if the channel is healthy.
    async fn health_check(&self) -> ChannelResult<()>;

    /// Shutdown the channel gracefully.
    async fn shutdown(&self) -> ChannelResult<()>;
}
