//! Two-step confirmation gate for deleting every conversation.
//!
//! ```text
//! Idle ──arm──▶ Armed ──exact phrase + authorized──▶ executing ──▶ Idle
//!                 │
//!                 └──cancel / TTL expiry──▶ Idle
//! ```

use crate::dashboard::{DashboardClient, Session};
use crate::error::{ConsoleError, ConsoleResult};
use std::time::{Duration, Instant};

/// Phrase that must be sent verbatim to confirm bulk deletion.
pub const CONFIRM_PHRASE: &str = "我知晓此操作为风险操作，操作后无法撤销或找回，执意删除所有对话数据";

/// Confirmation state of one command context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfirmationState {
    #[default]
    Idle,
    Armed { since: Instant },
}

/// Result of checking the gate when the confirmation phrase arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// No prior arm command.
    NotArmed,
    /// Armed too long ago; the arm has been cleared.
    Expired,
    /// Armed and within the TTL.
    Open,
}

impl ConfirmationState {
    /// Arm the gate. Re-arming refreshes the timestamp.
    pub fn arm(&mut self, now: Instant) {
        *self = Self::Armed { since: now };
    }

    /// Return to idle; reports whether the gate was armed.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.is_armed();
        *self = Self::Idle;
        was_armed
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }

    /// Check the gate without consuming it. An expired arm is cleared.
    pub fn check(&mut self, now: Instant, ttl: Option<Duration>) -> Gate {
        match *self {
            Self::Idle => Gate::NotArmed,
            Self::Armed { since } => match ttl {
                Some(ttl) if now.saturating_duration_since(since) > ttl => {
                    *self = Self::Idle;
                    Gate::Expired
                }
                _ => Gate::Open,
            },
        }
    }
}

/// Warning sent when the gate is armed.
pub fn arm_prompt() -> String {
    format!("请完整输入并发送二次确认指令「{CONFIRM_PHRASE}」以确认删除。")
}

/// Delete every conversation, stopping at the first failure.
///
/// Returns the number of deleted records. On failure the count of records
/// deleted before the abort is carried in `ConsoleError::BulkAborted`.
pub async fn delete_all(client: &DashboardClient, session: &mut Session) -> ConsoleResult<usize> {
    let records = client.list_all_conversations(session).await?;
    tracing::info!(total = records.len(), "Deleting all conversations");

    for (deleted, record) in records.iter().enumerate() {
        if let Err(e) = client.delete(session, record).await {
            tracing::error!(
                deleted,
                user_id = %record.user_id,
                cid = %record.cid,
                error = %e,
                "Bulk deletion aborted"
            );
            return Err(ConsoleError::BulkAborted {
                deleted,
                source: Box::new(e),
            });
        }
    }

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_without_arm() {
        let mut state = ConfirmationState::default();
        assert_eq!(state.check(Instant::now(), None), Gate::NotArmed);
    }

    #[test]
    fn test_arm_then_open() {
        let mut state = ConfirmationState::default();
        let now = Instant::now();
        state.arm(now);
        assert_eq!(state.check(now + Duration::from_secs(3600), None), Gate::Open);
        // Checking does not consume the arm
        assert!(state.is_armed());
    }

    #[test]
    fn test_arm_expires_with_ttl() {
        let mut state = ConfirmationState::default();
        let now = Instant::now();
        state.arm(now);
        let ttl = Some(Duration::from_secs(60));
        assert_eq!(state.check(now + Duration::from_secs(30), ttl), Gate::Open);
        assert_eq!(state.check(now + Duration::from_secs(61), ttl), Gate::Expired);
        assert_eq!(state, ConfirmationState::Idle);
    }

    #[test]
    fn test_cancel() {
        let mut state = ConfirmationState::default();
        assert!(!state.cancel());
        state.arm(Instant::now());
        assert!(state.cancel());
        assert!(!state.is_armed());
    }

    #[test]
    fn test_prompt_contains_phrase() {
        assert!(arm_prompt().contains(CONFIRM_PHRASE));
    }
}
