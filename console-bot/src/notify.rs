//! "Restart finished" notification that outlives the restart itself.
//!
//! The reply address of whoever asked for the restart is written to a
//! sentinel record. When the platform reports it is ready again, the record
//! is read, a notice is sent with bounded retry, and the record is removed
//! so it is never delivered twice.

use crate::error::{ConsoleError, ConsoleResult};
use crate::message::OutgoingMessage;
use crate::store::StateStore;
use crate::traits::MessageSender;
use console_common::NotifyConfig;
use std::sync::Arc;
use std::time::Duration;

/// Key of the single pending-notification record.
pub const SENTINEL_KEY: &str = "lastmember";

/// Timing of delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first attempt
    pub grace: Duration,
    /// Wait between failed attempts
    pub delay: Duration,
    /// Attempts after the first one
    pub max_retries: u32,
}

impl RetryPolicy {
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            delay: Duration::from_secs(5),
            max_retries: 5,
        }
    }
}

impl From<&NotifyConfig> for RetryPolicy {
    fn from(config: &NotifyConfig) -> Self {
        Self {
            grace: Duration::from_secs(config.grace_secs),
            delay: Duration::from_secs(config.retry_delay_secs),
            max_retries: config.max_retries,
        }
    }
}

/// What a delivery run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// No sentinel record existed.
    NothingPending,
    /// The notice went out on the given attempt.
    Delivered { attempts: u32 },
}

/// Records and delivers the pending restart notification.
pub struct RestartNotifier {
    store: Arc<dyn StateStore>,
    policy: RetryPolicy,
    message: String,
}

impl RestartNotifier {
    pub fn new(store: Arc<dyn StateStore>, policy: RetryPolicy, message: impl Into<String>) -> Self {
        Self {
            store,
            policy,
            message: message.into(),
        }
    }

    pub fn from_config(store: Arc<dyn StateStore>, config: &NotifyConfig) -> Self {
        Self::new(store, RetryPolicy::from(config), config.message.clone())
    }

    /// Remember `address` as the target of the next notification,
    /// replacing any earlier one.
    pub fn record_pending(&self, address: &str) -> ConsoleResult<()> {
        self.store.put(SENTINEL_KEY, address)?;
        tracing::debug!(address, "Recorded pending restart notification");
        Ok(())
    }

    /// Address currently waiting for a notification.
    pub fn pending(&self) -> ConsoleResult<Option<String>> {
        Ok(self.store.get(SENTINEL_KEY)?)
    }

    /// Drop the pending notification.
    pub fn clear_pending(&self) -> ConsoleResult<()> {
        self.store.delete(SENTINEL_KEY)?;
        Ok(())
    }

    /// Deliver the pending notification, if any.
    ///
    /// The sentinel is removed after the first success or after the last
    /// attempt, whichever comes first. Exhausting every attempt yields
    /// `ConsoleError::Delivery`.
    pub async fn deliver_pending(&self, sender: &dyn MessageSender) -> ConsoleResult<DeliveryOutcome> {
        let Some(address) = self.pending()? else {
            return Ok(DeliveryOutcome::NothingPending);
        };
        let address = address.trim().to_string();
        if address.is_empty() {
            self.clear_pending()?;
            return Ok(DeliveryOutcome::NothingPending);
        }

        tokio::time::sleep(self.policy.grace).await;

        let total = self.policy.total_attempts();
        let mut delivered = None;

        for attempt in 1..=total {
            match sender
                .send(OutgoingMessage::text(address.clone(), self.message.clone()))
                .await
            {
                Ok(_) => {
                    delivered = Some(attempt);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        address = %address,
                        attempt,
                        total,
                        error = %e,
                        "Restart notification failed, target adapter may not be up yet"
                    );
                    if attempt < total {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        if let Err(e) = self.clear_pending() {
            tracing::error!(error = %e, "Failed to remove restart sentinel");
        }

        match delivered {
            Some(attempts) => {
                tracing::info!(address = %address, attempts, "Restart notification delivered");
                Ok(DeliveryOutcome::Delivered { attempts })
            }
            None => Err(ConsoleError::Delivery {
                address,
                attempts: total,
            }),
        }
    }

    /// Run delivery on a detached task so command handling is never blocked.
    pub fn spawn_delivery(
        self: Arc<Self>,
        sender: Arc<dyn MessageSender>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match self.deliver_pending(sender.as_ref()).await {
                Ok(DeliveryOutcome::NothingPending) => {}
                Ok(DeliveryOutcome::Delivered { .. }) => {}
                Err(e) => tracing::error!(error = %e, "Restart notification abandoned"),
            }
        })
    }
}
