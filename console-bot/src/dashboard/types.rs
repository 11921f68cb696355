//! Wire types of the dashboard administrative API.

use serde::{Deserialize, Serialize};

/// Status value the dashboard uses for a successful call.
pub const STATUS_OK: &str = "ok";

/// Common response envelope: `{"status": "...", "message": "...", "data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: Option<String>,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Whether the envelope reports success.
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some(STATUS_OK)
    }

    /// Human-readable reason for a non-ok envelope.
    pub fn describe(&self) -> String {
        format!(
            "status={} message={}",
            self.status.as_deref().unwrap_or("<missing>"),
            self.message.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationPage {
    pub conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteRequest<'a> {
    pub user_id: &'a str,
    pub cid: &'a str,
}

/// A stored conversation as returned by the listing endpoint.
///
/// Identity is `(user_id, cid)`; every other field is carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_id: String,
    pub cid: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConversationRecord {
    pub fn new(user_id: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            cid: cid.into(),
            extra: serde_json::Map::new(),
        }
    }
}
