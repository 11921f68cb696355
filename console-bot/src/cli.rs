//! CLI channel adapter for operating the console from a terminal.
//!
//! The local operator is treated as an administrator of the platform.

use crate::message::{ChannelMessage, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult, MessageSender};
use async_trait::async_trait;
use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// Reply address used for every CLI message.
pub const CLI_ORIGIN: &str = "cli:console";

/// CLI channel - stdin/stdout, always available.
pub struct CliChannel {
    operator: String,
}

impl CliChannel {
    /// Create a new CLI channel for the given operator identity.
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
        }
    }

    /// Turn one input line into a message, skipping blanks.
    fn to_message(&self, line: &str) -> Option<ChannelMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(ChannelMessage::text(CLI_ORIGIN, self.operator.clone(), line).as_admin())
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new("operator")
    }
}

#[async_trait]
impl MessageSender for CliChannel {
    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        writeln!(std::io::stdout().lock(), "{}", message.as_text())
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    async fn listen<F>(&self, callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static,
    {
        let reader = BufReader::new(io::stdin());
        let mut lines = reader.lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if matches!(line.trim(), "/quit" | "/exit") {
                break;
            }
            if let Some(msg) = self.to_message(&line) {
                callback(msg);
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> ChannelResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        Ok(())
    }
}
