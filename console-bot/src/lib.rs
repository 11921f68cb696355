//! Console Bot - chat commands for the chatbot platform's admin API.
//!
//! Lets administrators restart the core and manage stored conversations from
//! a chat instead of the web dashboard.
//!
//! ## Architecture
//!
//! ```text
//! Chat → Channel → CommandDispatcher → DashboardClient → admin HTTP API
//!                        ↓
//!                  RestartNotifier ── StateStore (lastmember)
//!                        ↓ (platform ready)
//! Chat ←── MessageSender ←┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod auth;
pub mod cli;
pub mod commands;
pub mod confirm;
pub mod dashboard;
pub mod error;
pub mod matcher;
pub mod message;
pub mod notify;
pub mod store;
pub mod traits;

// Re-export commonly used types
pub use auth::RiskOperators;
pub use cli::CliChannel;
pub use commands::{Command, CommandContext, CommandDispatcher};
pub use confirm::{ConfirmationState, CONFIRM_PHRASE};
pub use dashboard::{ConversationRecord, DashboardClient, Session, SessionProvider};
pub use error::{ConsoleError, ConsoleResult};
pub use matcher::MatchSet;
pub use message::{ChannelMessage, OutgoingContent, OutgoingMessage};
pub use notify::{DeliveryOutcome, RestartNotifier, RetryPolicy};
pub use store::{FileStore, MemoryStore, StateStore};
pub use traits::{Channel, ChannelError, ChannelResult, MessageSender};
