//! Dashboard login and bearer-token session handling.

use super::types::{ApiEnvelope, LoginData, LoginRequest};
use crate::error::{ConsoleError, ConsoleResult};
use console_common::logging::redact_token;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// An authenticated dashboard session.
#[derive(Clone)]
pub struct Session {
    token: String,
    headers: HeaderMap,
}

impl Session {
    fn new(token: String) -> ConsoleResult<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ConsoleError::Auth("token is not a valid header value".into()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(Self { token, headers })
    }

    /// Headers to attach to every authenticated request.
    pub fn auth_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Redacted token, safe to log.
    pub fn preview(&self) -> String {
        redact_token(&self.token)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.preview())
            .finish()
    }
}

struct CachedSession {
    session: Session,
    obtained_at: Instant,
}

/// Obtains bearer tokens from `/api/auth/login`.
///
/// With a TTL configured the last token is reused until it ages out or the
/// dashboard rejects it; without one every call logs in again.
pub struct SessionProvider {
    client: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
    ttl: Option<Duration>,
    cached: Mutex<Option<CachedSession>>,
}

impl SessionProvider {
    /// Create a provider for the dashboard at `base_url`.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            client,
            login_url: format!("{base_url}/api/auth/login"),
            username: username.into(),
            password: password.into(),
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Log in unconditionally.
    ///
    /// Success requires HTTP 200, `status == "ok"` and a token at `data.token`.
    /// No retry is attempted.
    pub async fn login(&self) -> ConsoleResult<Session> {
        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
        };

        let response = self
            .client
            .post(&self.login_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Dashboard login request failed");
                ConsoleError::Auth(e.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status != reqwest::StatusCode::OK {
            tracing::error!(status = %status, body = %text, "Dashboard login rejected");
            return Err(ConsoleError::Auth(format!("HTTP {status}")));
        }

        let envelope: ApiEnvelope<LoginData> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(error = %e, body = %text, "Malformed login response");
            ConsoleError::Auth(format!("malformed response: {e}"))
        })?;

        if !envelope.is_ok() {
            tracing::error!(response = %envelope.describe(), "Dashboard login rejected");
            return Err(ConsoleError::Auth(envelope.describe()));
        }

        let token = envelope
            .data
            .map(|d| d.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                tracing::error!(body = %text, "Login response carries no token");
                ConsoleError::Auth("missing data.token".into())
            })?;

        let session = Session::new(token)?;
        tracing::info!(token = %session.preview(), "Dashboard login succeeded");
        Ok(session)
    }

    /// Return the cached session if it is still fresh, otherwise log in.
    pub async fn acquire(&self) -> ConsoleResult<Session> {
        let Some(ttl) = self.ttl else {
            return self.login().await;
        };

        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.obtained_at.elapsed() < ttl {
                tracing::debug!("Reusing cached dashboard session");
                return Ok(entry.session.clone());
            }
        }

        let session = self.login().await?;
        *cached = Some(CachedSession {
            session: session.clone(),
            obtained_at: Instant::now(),
        });
        Ok(session)
    }

    /// Drop the cached session and log in again.
    pub async fn refresh(&self) -> ConsoleResult<Session> {
        self.invalidate().await;
        self.acquire().await
    }

    /// Forget the cached session.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    /// Run `op` with `session`, retrying once with a fresh login if the
    /// dashboard answers 401.
    pub async fn with_reauth<T, F, Fut>(&self, session: &mut Session, op: F) -> ConsoleResult<T>
    where
        F: Fn(Session) -> Fut,
        Fut: Future<Output = ConsoleResult<T>>,
    {
        match op(session.clone()).await {
            Err(e) if e.is_unauthorized() => {
                tracing::info!("Dashboard session rejected, logging in again");
                *session = self.refresh().await?;
                op(session.clone()).await
            }
            other => other,
        }
    }
}
