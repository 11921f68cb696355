//! Chat command parsing and dispatch.
//!
//! Each `(origin, sender)` pair owns a [`CommandContext`] holding the pending
//! match list and the delete-all arm. Commands from one context run one at a
//! time; different contexts never wait on each other.

use crate::auth::RiskOperators;
use crate::confirm::{self, arm_prompt, ConfirmationState, Gate, CONFIRM_PHRASE};
use crate::dashboard::DashboardClient;
use crate::error::{ConsoleError, ConsoleResult};
use crate::matcher::{self, MatchSet};
use crate::message::{ChannelMessage, OutgoingMessage};
use crate::notify::RestartNotifier;
use crate::store::StateStore;
use crate::traits::MessageSender;
use console_common::logging::generate_trace_id;
use console_common::{command_span, Config};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::Instrument;

// ============================================================================
// Replies
// ============================================================================

pub const REPLY_PERMISSION_DENIED: &str = "权限不足。";
pub const REPLY_RESTART_ACK: &str = "重启指令已下发。";
pub const REPLY_LOGIN_FAILED: &str = "登录控制台失败。";
pub const REPLY_NO_MATCH: &str = "未找到该用户对话。";
pub const REPLY_BAD_INDEX: &str = "序号错误。";
pub const REPLY_MISSING_FRAGMENT: &str = "请在指令后空格附上要删除的用户 ID（可为部分内容）。";
pub const REPLY_DELETE_FAILED: &str = "删除对话失败。";
pub const REPLY_LIST_FAILED: &str = "获取对话列表失败。";
pub const REPLY_NOT_ARMED: &str = "未检测到前置操作命令。";
pub const REPLY_ALL_DELETED: &str = "已全部删除。";
pub const REPLY_CANCELLED: &str = "已取消删除所有对话数据。";

const HELP_TEXT: &str = "控制台指令：
/重启 - 重启 AstrBot 核心
/删除对话 <用户ID片段> - 查找并删除单个对话，按提示再发送序号
/删除所有对话数据 - 删除全部对话（需二次确认）
/取消删除 - 撤销待确认的全部删除
/控制台帮助 - 显示本帮助";

// ============================================================================
// Command parsing
// ============================================================================

/// A recognized console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Restart,
    /// Fragment search, or index selection when a match list is pending.
    DeleteSingle { arg: Option<String> },
    DeleteAllArm,
    DeleteAllConfirm,
    DeleteAllCancel,
    Help,
}

impl Command {
    /// Parse message text. Returns `None` for text that is not a console
    /// command. A leading `/` is optional.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix('/').unwrap_or(text).trim_start();

        if text == CONFIRM_PHRASE {
            return Some(Self::DeleteAllConfirm);
        }

        let mut parts = text.split_whitespace();
        let word = parts.next()?;
        let arg = parts.next().map(str::to_string);

        let command = match word {
            "restart" | "重启" => Self::Restart,
            "delete-single-conversation" | "删除对话" => Self::DeleteSingle { arg },
            "delete-all-conversations-step1" | "删除所有对话数据" => Self::DeleteAllArm,
            "cancel-delete-all" | "取消删除" => Self::DeleteAllCancel,
            "console-help" | "控制台帮助" => Self::Help,
            _ => return None,
        };
        Some(command)
    }

    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::DeleteSingle { .. } => "delete-single-conversation",
            Self::DeleteAllArm => "delete-all-conversations-step1",
            Self::DeleteAllConfirm => "delete-all-conversations-step2",
            Self::DeleteAllCancel => "cancel-delete-all",
            Self::Help => "console-help",
        }
    }
}

// ============================================================================
// Per-context state
// ============================================================================

/// Conversational state of one `(origin, sender)` pair.
#[derive(Debug, Default)]
pub struct CommandContext {
    /// Candidates awaiting index selection
    pub matches: Option<MatchSet>,
    pub confirmation: ConfirmationState,
}

type ContextKey = (String, String);

fn context_key(message: &ChannelMessage) -> ContextKey {
    (message.origin.clone(), message.sender_id.clone())
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes console commands to the dashboard and replies to the sender.
pub struct CommandDispatcher {
    client: Arc<DashboardClient>,
    notifier: Arc<RestartNotifier>,
    operators: RiskOperators,
    confirm_ttl: Option<Duration>,
    sender: Arc<dyn MessageSender>,
    contexts: DashMap<ContextKey, Arc<Mutex<CommandContext>>>,
}

impl CommandDispatcher {
    pub fn new(
        client: Arc<DashboardClient>,
        notifier: Arc<RestartNotifier>,
        operators: RiskOperators,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            client,
            notifier,
            operators,
            confirm_ttl: None,
            sender,
            contexts: DashMap::new(),
        }
    }

    /// Expire delete-all arms older than `ttl`.
    pub fn with_confirm_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.confirm_ttl = ttl;
        self
    }

    /// Wire a dispatcher from configuration.
    pub fn from_config(
        config: &Config,
        sender: Arc<dyn MessageSender>,
        store: Arc<dyn StateStore>,
    ) -> ConsoleResult<Self> {
        let client = Arc::new(DashboardClient::from_config(config)?);
        let notifier = Arc::new(RestartNotifier::from_config(store, &config.notify));
        let operators = RiskOperators::new(config.console.allow_risk_operators.iter().cloned());

        Ok(Self::new(client, notifier, operators, sender).with_confirm_ttl(config.console.confirm_ttl()))
    }

    pub fn notifier(&self) -> &Arc<RestartNotifier> {
        &self.notifier
    }

    /// Handle one incoming message.
    ///
    /// Returns the command that was recognized, `None` when the text is not
    /// addressed to this adapter.
    pub async fn dispatch(&self, message: &ChannelMessage) -> Option<Command> {
        let command = Command::parse(&message.text)?;
        let trace_id = generate_trace_id();
        let span = command_span!(
            trace_id,
            command = command.name(),
            message_id = %message.id,
            sender = %message.sender_id,
            origin = %message.origin
        );

        async {
            if !message.is_admin {
                tracing::warn!("Console command from non-admin sender rejected");
                self.reply(&message.origin, REPLY_PERMISSION_DENIED).await;
                return;
            }

            let context = self.context(message);
            let mut context = context.lock().await;
            tracing::info!("Handling console command");
            self.run(&command, &mut context, message).await;
        }
        .instrument(span)
        .await;

        Some(command)
    }

    /// Deliver a pending restart notification in the background.
    ///
    /// Call once the host platform reports that its adapters are loaded.
    pub fn on_platform_ready(&self) -> tokio::task::JoinHandle<()> {
        self.notifier.clone().spawn_delivery(self.sender.clone())
    }

    /// Spawn the message processing loop.
    ///
    /// Each context gets its own lane so its commands run in arrival order,
    /// while different contexts proceed concurrently. Once `rx` closes the
    /// loop waits for every lane to drain before the handle resolves.
    pub fn spawn_processor(
        dispatcher: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<ChannelMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Console command processor started");

            let mut lanes: HashMap<ContextKey, mpsc::UnboundedSender<ChannelMessage>> =
                HashMap::new();
            let mut workers = JoinSet::new();

            while let Some(message) = rx.recv().await {
                let lane = lanes.entry(context_key(&message)).or_insert_with(|| {
                    let (lane_tx, mut lane_rx) = mpsc::unbounded_channel::<ChannelMessage>();
                    let dispatcher = dispatcher.clone();
                    workers.spawn(async move {
                        while let Some(message) = lane_rx.recv().await {
                            dispatcher.dispatch(&message).await;
                        }
                    });
                    lane_tx
                });

                if let Err(e) = lane.send(message) {
                    tracing::error!(error = %e, "Context lane closed, dropping message");
                }
            }

            // Closing the lanes lets each worker finish its backlog and exit
            drop(lanes);
            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Context worker failed");
                }
            }

            tracing::info!("Console command processor stopped");
        })
    }

    fn context(&self, message: &ChannelMessage) -> Arc<Mutex<CommandContext>> {
        self.contexts
            .entry(context_key(message))
            .or_default()
            .value()
            .clone()
    }

    async fn reply(&self, origin: &str, text: impl Into<String>) {
        if let Err(e) = self.sender.send(OutgoingMessage::text(origin, text)).await {
            tracing::warn!(origin, error = %e, "Failed to send reply");
        }
    }

    async fn run(&self, command: &Command, context: &mut CommandContext, message: &ChannelMessage) {
        let origin = message.origin.as_str();
        let reply = match command {
            Command::Restart => {
                self.restart(origin).await;
                None
            }
            Command::DeleteSingle { arg } => Some(self.delete_single(context, arg.as_deref()).await),
            Command::DeleteAllArm => {
                context.confirmation.arm(Instant::now());
                Some(arm_prompt())
            }
            Command::DeleteAllConfirm => self.delete_all(context, &message.sender_id).await,
            Command::DeleteAllCancel => Some(if context.confirmation.cancel() {
                REPLY_CANCELLED.to_string()
            } else {
                REPLY_NOT_ARMED.to_string()
            }),
            Command::Help => Some(HELP_TEXT.to_string()),
        };

        if let Some(text) = reply {
            self.reply(origin, text).await;
        }
    }

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    /// Record the sentinel, acknowledge, then ask the core to restart.
    async fn restart(&self, origin: &str) {
        if let Err(e) = self.notifier.record_pending(origin) {
            tracing::error!(error = %e, "Failed to record restart notification target");
        }

        let mut session = match self.client.login().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Restart aborted, dashboard login failed");
                if let Err(e) = self.notifier.clear_pending() {
                    tracing::error!(error = %e, "Failed to clear restart notification target");
                }
                self.reply(origin, REPLY_LOGIN_FAILED).await;
                return;
            }
        };

        self.reply(origin, REPLY_RESTART_ACK).await;

        // The core may go down before it answers; the sentinel stays either way
        if let Err(e) = self.client.restart(&mut session).await {
            tracing::error!(error = %e, "Restart request failed");
        }
    }

    async fn delete_single(&self, context: &mut CommandContext, arg: Option<&str>) -> String {
        if let Some(matches) = context.matches.take() {
            let record = match matches.select(arg.unwrap_or_default()) {
                Ok(record) => record,
                Err(e) => {
                    tracing::info!(error = %e, "Index selection rejected");
                    return REPLY_BAD_INDEX.to_string();
                }
            };

            let result = match self.client.login().await {
                Ok(mut session) => self.client.delete(&mut session, record).await,
                Err(e) => Err(e),
            };
            return match result {
                Ok(()) => {
                    tracing::info!(user_id = %record.user_id, cid = %record.cid, "Conversation deleted");
                    format!("已删除对话：{}", record.user_id)
                }
                Err(e) => {
                    tracing::error!(user_id = %record.user_id, error = %e, "Conversation deletion failed");
                    REPLY_DELETE_FAILED.to_string()
                }
            };
        }

        let Some(fragment) = arg.filter(|f| !f.is_empty()) else {
            return REPLY_MISSING_FRAGMENT.to_string();
        };

        let found = match self.client.login().await {
            Ok(mut session) => matcher::find_by_fragment(&self.client, &mut session, fragment).await,
            Err(e) => Err(e),
        };
        match found {
            Ok(matches) if matches.is_empty() => REPLY_NO_MATCH.to_string(),
            Ok(matches) => {
                let text = matches.render();
                context.matches = Some(matches);
                text
            }
            Err(e) => {
                tracing::error!(error = %e, "Conversation lookup failed");
                REPLY_LIST_FAILED.to_string()
            }
        }
    }

    /// Second step of delete-all. Returns `None` when the request is
    /// dropped silently.
    async fn delete_all(&self, context: &mut CommandContext, sender_id: &str) -> Option<String> {
        match context.confirmation.check(Instant::now(), self.confirm_ttl) {
            Gate::NotArmed => return Some(REPLY_NOT_ARMED.to_string()),
            Gate::Expired => {
                tracing::info!("Delete-all arm expired before confirmation");
                return Some(REPLY_NOT_ARMED.to_string());
            }
            Gate::Open => {}
        }

        if !self.operators.is_authorized(sender_id) {
            tracing::warn!(sender = %sender_id, "Sender is not an allowed risk operator");
            return None;
        }

        context.confirmation.cancel();

        let mut session = match self.client.login().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Bulk deletion aborted, dashboard login failed");
                return Some(REPLY_LOGIN_FAILED.to_string());
            }
        };

        let reply = match confirm::delete_all(&self.client, &mut session).await {
            Ok(deleted) => {
                tracing::info!(deleted, "All conversations deleted");
                REPLY_ALL_DELETED.to_string()
            }
            Err(ConsoleError::BulkAborted { deleted, .. }) => {
                format!("删除过程中出错，已中止。此前已删除 {deleted} 条对话。")
            }
            Err(e) => {
                tracing::error!(error = %e, "Conversation listing failed");
                REPLY_LIST_FAILED.to_string()
            }
        };
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{http_client, SessionProvider};
    use crate::notify::RetryPolicy;
    use crate::store::MemoryStore;
    use crate::traits::ChannelResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use test_case::test_case;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ORIGIN: &str = "aiocqhttp:GroupMessage:42";

    #[derive(Default)]
    struct RecordingSender {
        sent: StdMutex<Vec<OutgoingMessage>>,
    }

    impl RecordingSender {
        fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|m| m.as_text().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
            self.sent.lock().unwrap().push(message);
            Ok("sent".into())
        }
    }

    struct Harness {
        dispatcher: CommandDispatcher,
        sender: Arc<RecordingSender>,
        store: Arc<MemoryStore>,
    }

    fn harness(server: &MockServer, operators: RiskOperators) -> Harness {
        let http = http_client(Duration::from_secs(2)).unwrap();
        let sessions = SessionProvider::new(http.clone(), &server.uri(), "astrbot", "pw", None);
        let client = Arc::new(DashboardClient::new(server.uri(), sessions, http).with_paging(10, 5));

        let store = Arc::new(MemoryStore::new());
        let policy = RetryPolicy {
            grace: Duration::ZERO,
            delay: Duration::ZERO,
            max_retries: 5,
        };
        let notifier = Arc::new(RestartNotifier::new(store.clone(), policy, "AstrBot 已重启完毕。"));
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = CommandDispatcher::new(client, notifier, operators, sender.clone());

        Harness {
            dispatcher,
            sender,
            store,
        }
    }

    fn admin(text: &str) -> ChannelMessage {
        ChannelMessage::text(ORIGIN, "10001", text).as_admin()
    }

    async fn mount_login(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "status": "ok",
                "data": { "token": "token-0123456789" }
            })))
            .mount(server)
            .await;
    }

    #[test_case("/restart", Some(Command::Restart) ; "slash english")]
    #[test_case("重启", Some(Command::Restart) ; "chinese alias")]
    #[test_case("/删除对话 abc", Some(Command::DeleteSingle { arg: Some("abc".into()) }) ; "delete with arg")]
    #[test_case("删除对话", Some(Command::DeleteSingle { arg: None }) ; "delete without arg")]
    #[test_case("/删除所有对话数据", Some(Command::DeleteAllArm) ; "arm")]
    #[test_case("取消删除", Some(Command::DeleteAllCancel) ; "cancel")]
    #[test_case("/控制台帮助", Some(Command::Help) ; "help")]
    #[test_case("hello there", None ; "unrelated text")]
    #[test_case("", None ; "empty")]
    #[test_case("/restarting", None ; "prefix is not enough")]
    fn test_parse(text: &str, expected: Option<Command>) {
        assert_eq!(Command::parse(text), expected);
    }

    #[test]
    fn test_parse_confirm_phrase() {
        assert_eq!(Command::parse(CONFIRM_PHRASE), Some(Command::DeleteAllConfirm));
        assert_eq!(
            Command::parse(&format!("/{CONFIRM_PHRASE}")),
            Some(Command::DeleteAllConfirm)
        );
        assert_eq!(Command::parse(&format!("{CONFIRM_PHRASE}!")), None);
    }

    #[tokio::test]
    async fn test_non_admin_is_denied() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());

        let msg = ChannelMessage::text(ORIGIN, "10001", "/restart");
        assert_eq!(h.dispatcher.dispatch(&msg).await, Some(Command::Restart));
        assert_eq!(h.sender.texts(), vec![REPLY_PERMISSION_DENIED]);
        assert_eq!(h.store.get(crate::notify::SENTINEL_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_text_is_ignored() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());
        assert_eq!(h.dispatcher.dispatch(&admin("good morning")).await, None);
        assert!(h.sender.texts().is_empty());
    }

    #[tokio::test]
    async fn test_restart_records_sentinel_and_acks() {
        let server = MockServer::start().await;
        mount_login(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/api/stat/restart-core"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, RiskOperators::default());
        h.dispatcher.dispatch(&admin("/重启")).await;

        assert_eq!(h.sender.texts(), vec![REPLY_RESTART_ACK]);
        assert_eq!(
            h.store.get(crate::notify::SENTINEL_KEY).unwrap().as_deref(),
            Some(ORIGIN)
        );
    }

    #[tokio::test]
    async fn test_restart_failure_keeps_sentinel() {
        let server = MockServer::start().await;
        mount_login(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/api/stat/restart-core"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let h = harness(&server, RiskOperators::default());
        h.dispatcher.dispatch(&admin("/restart")).await;

        assert_eq!(h.sender.texts(), vec![REPLY_RESTART_ACK]);
        assert!(h.store.get(crate::notify::SENTINEL_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restart_login_failure_clears_sentinel() {
        let server = MockServer::start().await;
        mount_login(&server, 401).await;
        Mock::given(method("POST"))
            .and(path("/api/stat/restart-core"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server, RiskOperators::default());
        h.dispatcher.dispatch(&admin("/restart")).await;

        assert_eq!(h.sender.texts(), vec![REPLY_LOGIN_FAILED]);
        assert_eq!(h.store.get(crate::notify::SENTINEL_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_confirm_without_arm() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());

        h.dispatcher.dispatch(&admin(CONFIRM_PHRASE)).await;
        assert_eq!(h.sender.texts(), vec![REPLY_NOT_ARMED]);
    }

    #[tokio::test]
    async fn test_unauthorized_confirm_is_silent_and_stays_armed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conversation/delete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server, RiskOperators::new(["99999"]));
        h.dispatcher.dispatch(&admin("/删除所有对话数据")).await;
        h.dispatcher.dispatch(&admin(CONFIRM_PHRASE)).await;

        assert_eq!(h.sender.texts(), vec![arm_prompt()]);
        let context = h.dispatcher.context(&admin(""));
        assert!(context.lock().await.confirmation.is_armed());
    }

    #[tokio::test]
    async fn test_cancel_disarms() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());

        h.dispatcher.dispatch(&admin("/删除所有对话数据")).await;
        h.dispatcher.dispatch(&admin("/取消删除")).await;
        h.dispatcher.dispatch(&admin(CONFIRM_PHRASE)).await;

        let texts = h.sender.texts();
        assert_eq!(texts[1], REPLY_CANCELLED);
        assert_eq!(texts[2], REPLY_NOT_ARMED);
    }

    #[tokio::test]
    async fn test_contexts_are_independent() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());

        h.dispatcher.dispatch(&admin("/删除所有对话数据")).await;
        let other = ChannelMessage::text("aiocqhttp:GroupMessage:7", "10001", CONFIRM_PHRASE).as_admin();
        h.dispatcher.dispatch(&other).await;

        assert_eq!(h.sender.texts()[1], REPLY_NOT_ARMED);
        let context = h.dispatcher.context(&admin(""));
        assert!(context.lock().await.confirmation.is_armed());
    }

    #[tokio::test]
    async fn test_missing_fragment() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());
        h.dispatcher.dispatch(&admin("/删除对话")).await;
        assert_eq!(h.sender.texts(), vec![REPLY_MISSING_FRAGMENT]);
    }

    #[tokio::test]
    async fn test_help() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());
        h.dispatcher.dispatch(&admin("/控制台帮助")).await;
        assert!(h.sender.texts()[0].contains("/删除所有对话数据"));
    }

    #[tokio::test]
    async fn test_ready_hook_delivers_once() {
        let server = MockServer::start().await;
        let h = harness(&server, RiskOperators::default());
        h.dispatcher.notifier().record_pending(ORIGIN).unwrap();

        h.dispatcher.on_platform_ready().await.unwrap();
        h.dispatcher.on_platform_ready().await.unwrap();

        assert_eq!(h.sender.texts(), vec!["AstrBot 已重启完毕。"]);
    }
}
