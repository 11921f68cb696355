//! Typed operations on the dashboard administrative API.

use super::session::{Session, SessionProvider};
use super::types::{ApiEnvelope, ConversationPage, ConversationRecord, DeleteRequest};
use crate::error::{ConsoleError, ConsoleResult};
use console_common::Config;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Client for the restart and conversation endpoints.
pub struct DashboardClient {
    client: reqwest::Client,
    base_url: String,
    sessions: SessionProvider,
    page_size: u32,
    max_pages: u32,
}

impl DashboardClient {
    /// Create a client for the dashboard at `base_url`.
    pub fn new(base_url: impl Into<String>, sessions: SessionProvider, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            sessions,
            page_size: 100,
            max_pages: 1000,
        }
    }

    /// Build a client from the adapter configuration.
    pub fn from_config(config: &Config) -> ConsoleResult<Self> {
        let client = http_client(config.console.request_timeout())?;
        let base_url = config.base_url();
        let sessions = SessionProvider::new(
            client.clone(),
            &base_url,
            config.dashboard.username.clone(),
            config.dashboard.password.clone(),
            config.console.session_ttl(),
        );
        Ok(Self::new(base_url, sessions, client)
            .with_paging(config.console.page_size, config.console.max_pages))
    }

    /// Set the listing page size and the page bound.
    pub fn with_paging(mut self, page_size: u32, max_pages: u32) -> Self {
        self.page_size = page_size;
        self.max_pages = max_pages;
        self
    }

    /// Session provider used by this client.
    pub fn sessions(&self) -> &SessionProvider {
        &self.sessions
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ------------------------------------------------------------------------
    // Single requests
    // ------------------------------------------------------------------------

    /// `POST /api/stat/restart-core`.
    pub async fn restart_core(&self, session: &Session) -> ConsoleResult<()> {
        let request = self
            .client
            .post(self.url("/api/stat/restart-core"))
            .headers(session.auth_headers().clone());
        let _: ApiEnvelope<serde_json::Value> = self.execute("restart core", request, true).await?;
        Ok(())
    }

    /// `GET /api/conversation/list?page=&page_size=`.
    pub async fn list_conversations(
        &self,
        session: &Session,
        page: u32,
        page_size: u32,
    ) -> ConsoleResult<Vec<ConversationRecord>> {
        let request = self
            .client
            .get(self.url("/api/conversation/list"))
            .query(&[("page", page), ("page_size", page_size)])
            .headers(session.auth_headers().clone());
        let envelope: ApiEnvelope<ConversationPage> =
            self.execute("list conversations", request, false).await?;

        envelope
            .data
            .map(|d| d.conversations)
            .ok_or_else(|| ConsoleError::decode("list conversations", "missing data.conversations"))
    }

    /// `POST /api/conversation/delete` with `{user_id, cid}`.
    pub async fn delete_conversation(
        &self,
        session: &Session,
        user_id: &str,
        cid: &str,
    ) -> ConsoleResult<()> {
        let request = self
            .client
            .post(self.url("/api/conversation/delete"))
            .headers(session.auth_headers().clone())
            .json(&DeleteRequest { user_id, cid });
        let _: ApiEnvelope<serde_json::Value> =
            self.execute("delete conversation", request, true).await?;
        tracing::debug!(user_id = %user_id, cid = %cid, "Conversation deleted");
        Ok(())
    }

    /// Send a request and decode the envelope.
    ///
    /// Non-200 responses, undecodable bodies and non-"ok" statuses are all
    /// failures. When `require_status` is false a missing status field is
    /// tolerated, an explicit non-"ok" one is not.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        require_status: bool,
    ) -> ConsoleResult<ApiEnvelope<T>> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Dashboard request failed");
            ConsoleError::remote(operation, None, e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != reqwest::StatusCode::OK {
            tracing::error!(operation, status = %status, body = %body, "Dashboard returned an error");
            return Err(ConsoleError::remote(operation, Some(status.as_u16()), body));
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(operation, error = %e, body = %body, "Malformed dashboard response");
            ConsoleError::decode(operation, e.to_string())
        })?;

        let accepted = envelope.is_ok() || (!require_status && envelope.status.is_none());
        if !accepted {
            tracing::error!(operation, response = %envelope.describe(), "Dashboard rejected the request");
            return Err(ConsoleError::remote(
                operation,
                Some(status.as_u16()),
                envelope.describe(),
            ));
        }

        Ok(envelope)
    }

    // ------------------------------------------------------------------------
    // Workflows (401 triggers one re-login)
    // ------------------------------------------------------------------------

    /// Obtain a session for a logical operation.
    pub async fn login(&self) -> ConsoleResult<Session> {
        self.sessions.acquire().await
    }

    /// Trigger a core restart.
    pub async fn restart(&self, session: &mut Session) -> ConsoleResult<()> {
        self.sessions
            .with_reauth(session, |s| async move { self.restart_core(&s).await })
            .await
    }

    /// Delete one conversation record.
    pub async fn delete(&self, session: &mut Session, record: &ConversationRecord) -> ConsoleResult<()> {
        self.sessions
            .with_reauth(session, |s| async move {
                self.delete_conversation(&s, &record.user_id, &record.cid).await
            })
            .await
    }

    /// Fetch every conversation, page by page, until an empty page.
    ///
    /// Reaching the page bound without an empty page aborts the listing.
    pub async fn list_all_conversations(
        &self,
        session: &mut Session,
    ) -> ConsoleResult<Vec<ConversationRecord>> {
        let mut all = Vec::new();

        for page in 1..=self.max_pages {
            let page_size = self.page_size;
            let batch = self
                .sessions
                .with_reauth(session, |s| async move {
                    self.list_conversations(&s, page, page_size).await
                })
                .await?;

            if batch.is_empty() {
                tracing::debug!(pages = page - 1, total = all.len(), "Conversation listing complete");
                return Ok(all);
            }
            all.extend(batch);
        }

        tracing::error!(max_pages = self.max_pages, fetched = all.len(), "Conversation listing hit the page bound");
        Err(ConsoleError::PaginationLimit {
            max_pages: self.max_pages,
        })
    }
}

/// Build the shared HTTP client with the per-request timeout.
///
/// There is no fallback client: every dashboard call must carry the timeout.
pub fn http_client(timeout: Duration) -> ConsoleResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build HTTP client");
            ConsoleError::HttpClient(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": { "token": "token-0123456789" }
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer, max_pages: u32) -> DashboardClient {
        let http = http_client(Duration::from_secs(2)).unwrap();
        let sessions = SessionProvider::new(http.clone(), &server.uri(), "astrbot", "pw", None);
        DashboardClient::new(server.uri(), sessions, http).with_paging(2, max_pages)
    }

    fn page(records: &[(&str, &str)]) -> ResponseTemplate {
        let conversations: Vec<_> = records
            .iter()
            .map(|(u, c)| json!({ "user_id": u, "cid": c, "title": "t" }))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "data": { "conversations": conversations, "pagination": {} }
        }))
    }

    #[tokio::test]
    async fn test_restart_core_ok() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/stat/restart-core"))
            .and(header("authorization", "Bearer token-0123456789"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, 10);
        let mut session = client.login().await.unwrap();
        client.restart(&mut session).await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_core_error_status() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/stat/restart-core"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "busy"
            })))
            .mount(&server)
            .await;

        let client = client(&server, 10);
        let mut session = client.login().await.unwrap();
        let err = client.restart(&mut session).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Remote { operation: "restart core", .. }));
    }

    #[tokio::test]
    async fn test_pagination_concatenates_pages_in_order() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/conversation/list"))
            .and(query_param("page", "1"))
            .and(query_param("page_size", "2"))
            .respond_with(page(&[("a", "1"), ("b", "2")]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/conversation/list"))
            .and(query_param("page", "2"))
            .respond_with(page(&[("c", "3")]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/conversation/list"))
            .and(query_param("page", "3"))
            .respond_with(page(&[]))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, 1000);
        let mut session = client.login().await.unwrap();
        let all = client.list_all_conversations(&mut session).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.cid.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_pagination_aborts_at_page_bound() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/conversation/list"))
            .respond_with(page(&[("x", "1")]))
            .expect(3)
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let mut session = client.login().await.unwrap();
        let err = client.list_all_conversations(&mut session).await.unwrap_err();
        assert!(matches!(err, ConsoleError::PaginationLimit { max_pages: 3 }));
    }

    #[tokio::test]
    async fn test_list_missing_conversations_is_decode_failure() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/conversation/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok", "data": {} })))
            .mount(&server)
            .await;

        let client = client(&server, 10);
        let session = client.login().await.unwrap();
        let err = client.list_conversations(&session, 1, 2).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_delete_sends_identity_body() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/conversation/delete"))
            .and(body_json(json!({ "user_id": "u-1", "cid": "c-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok", "data": null })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, 10);
        let mut session = client.login().await.unwrap();
        client
            .delete(&mut session, &ConversationRecord::new("u-1", "c-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_non_200_is_remote_failure() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/conversation/delete"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such conversation"))
            .mount(&server)
            .await;

        let client = client(&server, 10);
        let mut session = client.login().await.unwrap();
        let err = client
            .delete(&mut session, &ConversationRecord::new("u-1", "c-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Remote { status: Some(404), .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_triggers_single_relogin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": { "token": "token-0123456789" }
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/stat/restart-core"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, 10);
        let mut session = client.login().await.unwrap();
        let err = client.restart(&mut session).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_configured_timeout_applies_to_requests() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/stat/restart-core"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "ok" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.console.base_url = server.uri();
        config.console.request_timeout_secs = 1;
        config.console.session_ttl_secs = 0;
        config.dashboard.username = "astrbot".into();

        let client = DashboardClient::from_config(&config).unwrap();
        let mut session = client.login().await.unwrap();
        let err = client.restart(&mut session).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Remote { status: None, .. }));
    }
}
