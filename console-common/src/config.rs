//! Configuration management for the console command adapter.
//!
//! The adapter reads a single configuration file at `~/.consoleapi/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (CONSOLE_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `CONSOLE_BASE_URL` → console.base_url
//! - `CONSOLE_RISK_OPERATORS` → console.allow_risk_operators (comma-separated)
//! - `CONSOLE_DASHBOARD_USERNAME` → dashboard.username
//! - `CONSOLE_DASHBOARD_PASSWORD` → dashboard.password
//! - `CONSOLE_LOG_LEVEL` → observability.log_level

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".consoleapi"),
        |dirs| dirs.home_dir().join(".consoleapi"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Console API Configuration
// ============================================================================

/// Settings for talking to the administrative API and gating risky commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Base URL of the dashboard API.
    /// Empty string means "derive from dashboard host/port".
    #[serde(default)]
    pub base_url: String,

    /// Identities allowed to confirm bulk deletion.
    /// Empty list means everyone passes the check.
    #[serde(default)]
    pub allow_risk_operators: Vec<String>,

    /// Conversations fetched per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hard upper bound on listing pages
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long a login token is reused, in seconds.
    /// 0 logs in again for every operation.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// How long a delete-all arm stays valid, in seconds.
    /// 0 keeps it armed until confirmed or cancelled.
    #[serde(default)]
    pub confirm_ttl_secs: u64,

    /// Directory holding persisted plugin state (restart sentinel).
    #[serde(default)]
    pub data_dir: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            allow_risk_operators: Vec::new(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout(),
            session_ttl_secs: default_session_ttl(),
            confirm_ttl_secs: 0,
            data_dir: None,
        }
    }
}

impl ConsoleConfig {
    /// Per-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Session reuse window, `None` when every operation logs in again.
    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    /// Delete-all arm lifetime, `None` when it never expires.
    pub fn confirm_ttl(&self) -> Option<Duration> {
        (self.confirm_ttl_secs > 0).then(|| Duration::from_secs(self.confirm_ttl_secs))
    }
}

// ============================================================================
// Dashboard Configuration
// ============================================================================

/// Dashboard credentials and address, as configured on the host platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_host")]
    pub host: String,

    #[serde(default = "default_dashboard_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_dashboard_host(),
            port: default_dashboard_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl DashboardConfig {
    /// Host the client should connect to.
    ///
    /// A wildcard bind address is not reachable as a destination, so `0.0.0.0`
    /// is rewritten to loopback.
    pub fn reachable_host(&self) -> &str {
        if self.host == "0.0.0.0" {
            "127.0.0.1"
        } else {
            &self.host
        }
    }
}

// ============================================================================
// Restart Notification Configuration
// ============================================================================

/// Delivery policy for the "restart finished" notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Wait after the ready signal before the first attempt
    #[serde(default = "default_notify_grace")]
    pub grace_secs: u64,

    /// Delay between failed attempts
    #[serde(default = "default_notify_delay")]
    pub retry_delay_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_notify_retries")]
    pub max_retries: u32,

    /// Text sent once the platform is back
    #[serde(default = "default_notify_message")]
    pub message: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_notify_grace(),
            retry_delay_secs: default_notify_delay(),
            max_retries: default_notify_retries(),
            message: default_notify_message(),
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to quiet down to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub console: ConsoleConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        // Config files written by some editors on Windows carry a BOM.
        let content = content.trim_start_matches('\u{feff}');

        serde_json::from_str(content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CONSOLE_BASE_URL") {
            self.console.base_url = url;
        }
        if let Ok(ops) = std::env::var("CONSOLE_RISK_OPERATORS") {
            self.console.allow_risk_operators = ops
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(user) = std::env::var("CONSOLE_DASHBOARD_USERNAME") {
            self.dashboard.username = user;
        }
        if let Ok(pass) = std::env::var("CONSOLE_DASHBOARD_PASSWORD") {
            self.dashboard.password = pass;
        }
        if let Ok(level) = std::env::var("CONSOLE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }

    /// Effective base URL of the dashboard API.
    ///
    /// Priority:
    /// 1. `console.base_url` when non-empty
    /// 2. `http://{dashboard.host}:{dashboard.port}`
    pub fn base_url(&self) -> String {
        let explicit = self.console.base_url.trim();
        if !explicit.is_empty() {
            return explicit.trim_end_matches('/').to_string();
        }
        format!(
            "http://{}:{}",
            self.dashboard.reachable_host(),
            self.dashboard.port
        )
    }

    /// Directory for persisted plugin state, with `~` and env vars expanded.
    pub fn data_dir(&self) -> PathBuf {
        match self.console.data_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => {
                PathBuf::from(shellexpand::full(dir).map_or_else(|_| dir.into(), |s| s.into_owned()))
            }
            _ => config_dir().join("data"),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    1000
}

fn default_request_timeout() -> u64 {
    15
}

fn default_session_ttl() -> u64 {
    300 // 5 minutes, well inside the dashboard's token lifetime
}

fn default_dashboard_host() -> String {
    "127.0.0.1".into()
}

fn default_dashboard_port() -> u16 {
    6185
}

fn default_notify_grace() -> u64 {
    5
}

fn default_notify_delay() -> u64 {
    5
}

fn default_notify_retries() -> u32 {
    5
}

fn default_notify_message() -> String {
    "AstrBot 已重启完毕。".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}
