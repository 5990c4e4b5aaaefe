//! Configuration for the charla gateway.
//!
//! Loaded from a TOML file (default `~/.charla/charla.toml` or the path in
//! `CHARLA_CONFIG`), with selected `CHARLA_*` environment overrides applied
//! on top. Every timeout in the file is expressed in seconds.

use std::{path::PathBuf, time::Duration};

use {
    anyhow::{Context, Result},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharlaConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sidecar: SidecarConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub keyword: KeywordConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub auto_reply: AutoReplyConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// WebSocket connection to the messaging sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default = "default_sidecar_url")]
    pub url: String,
    /// Timeout for a single request/response round trip, seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

/// Token-validation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,
}

/// Keyword-matching collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,
}

/// Session registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_max_qr_attempts")]
    pub max_qr_attempts: u32,
    /// Root for per-token authentication profiles.
    #[serde(default)]
    pub auth_cache_dir: Option<PathBuf>,
    /// Browser render cache removed wholesale by bulk shutdown.
    #[serde(default)]
    pub browser_cache_dir: Option<PathBuf>,
    /// Shared secret gating bulk shutdown.
    #[serde(default)]
    pub admin_secret: String,
}

/// Chat-assistant browser automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_url")]
    pub url: String,
    /// Explicit browser binary; discovered on PATH when unset.
    #[serde(default)]
    pub browser_path: Option<PathBuf>,
    #[serde(default = "default_init_attempts")]
    pub init_attempts: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_rounds")]
    pub max_poll_rounds: u32,
    /// Bound on waiting for the submitted message to echo back.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Response substrings that trigger the throttle circuit breaker.
    #[serde(default = "default_throttle_markers")]
    pub throttle_markers: Vec<String>,
}

/// How the router answers when the assistant flow fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Suppress the reply entirely.
    #[default]
    Silent,
    /// Reply with the configured apology text.
    Apology,
}

/// Inbound message routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyConfig {
    #[serde(default = "default_prefix")]
    pub assistant_prefix: String,
    #[serde(default = "default_assistant_init_timeout")]
    pub init_timeout_secs: u64,
    #[serde(default = "default_assistant_chat_timeout")]
    pub chat_timeout_secs: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_apology_text")]
    pub apology_text: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_sidecar_url() -> String {
    "ws://127.0.0.1:9876".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_connect_retries() -> u32 {
    5
}
fn default_collaborator_timeout() -> u64 {
    10
}
fn default_max_qr_attempts() -> u32 {
    5
}
fn default_assistant_url() -> String {
    "https://chat.openai.com/".into()
}
fn default_init_attempts() -> u32 {
    3
}
fn default_poll_interval() -> u64 {
    10
}
fn default_max_poll_rounds() -> u32 {
    160
}
fn default_submit_timeout() -> u64 {
    30
}
fn default_idle_timeout() -> u64 {
    150
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_throttle_markers() -> Vec<String> {
    vec!["Unusual activity has been detected from your device. Try again later.".into()]
}
fn default_prefix() -> String {
    "!gpt:".into()
}
fn default_assistant_init_timeout() -> u64 {
    20
}
fn default_assistant_chat_timeout() -> u64 {
    30
}
fn default_apology_text() -> String {
    "Sorry, the assistant is unavailable right now.".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            url: default_sidecar_url(),
            request_timeout_secs: default_request_timeout(),
            connect_retries: default_connect_retries(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_collaborator_timeout(),
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_collaborator_timeout(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_qr_attempts: default_max_qr_attempts(),
            auth_cache_dir: None,
            browser_cache_dir: None,
            admin_secret: String::new(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            url: default_assistant_url(),
            browser_path: None,
            init_attempts: default_init_attempts(),
            poll_interval_secs: default_poll_interval(),
            max_poll_rounds: default_max_poll_rounds(),
            submit_timeout_secs: default_submit_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            throttle_markers: default_throttle_markers(),
        }
    }
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            assistant_prefix: default_prefix(),
            init_timeout_secs: default_assistant_init_timeout(),
            chat_timeout_secs: default_assistant_chat_timeout(),
            failure_policy: FailurePolicy::default(),
            apology_text: default_apology_text(),
        }
    }
}

impl SidecarConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl KeywordConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AssistantConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl AutoReplyConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }
}

impl CharlaConfig {
    /// Default config file location (`~/.charla/charla.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::UserDirs::new().map(|d| d.home_dir().join(".charla").join("charla.toml"))
    }

    /// Load configuration from an explicit path, `CHARLA_CONFIG`, or the
    /// default location. A missing file yields defaults.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let resolved = path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CHARLA_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_path);

        let mut config = match resolved {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p)
                    .with_context(|| format!("reading config at {}", p.display()))?;
                let parsed: Self = toml::from_str(&raw)
                    .with_context(|| format!("parsing config at {}", p.display()))?;
                debug!(path = %p.display(), "loaded config file");
                parsed
            },
            _ => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Apply `CHARLA_*` environment overrides on top of the file values.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CHARLA_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("CHARLA_SIDECAR_URL") {
            self.sidecar.url = v;
        }
        if let Ok(v) = std::env::var("CHARLA_VALIDATION_URL") {
            self.validation.url = v;
        }
        if let Ok(v) = std::env::var("CHARLA_KEYWORD_URL") {
            self.keyword.url = v;
        }
        if let Ok(v) = std::env::var("CHARLA_ADMIN_SECRET") {
            self.sessions.admin_secret = v;
        }
        if let Ok(v) = std::env::var("CHARLA_ASSISTANT_URL") {
            self.assistant.url = v;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let c = CharlaConfig::default();
        assert_eq!(c.sessions.max_qr_attempts, 5);
        assert_eq!(c.assistant.poll_interval_secs, 10);
        assert_eq!(c.assistant.max_poll_rounds, 160);
        assert_eq!(c.assistant.idle_timeout_secs, 150);
        assert_eq!(c.assistant.sweep_interval_secs, 60);
        assert_eq!(c.assistant.init_attempts, 3);
        assert_eq!(c.auto_reply.assistant_prefix, "!gpt:");
        assert_eq!(c.auto_reply.failure_policy, FailurePolicy::Silent);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let raw = r#"
            [server]
            port = 8080

            [auto_reply]
            failure_policy = "apology"
            apology_text = "lo sentimos"
        "#;
        let c: CharlaConfig = toml::from_str(raw).unwrap();
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.server.host, "0.0.0.0");
        assert_eq!(c.auto_reply.failure_policy, FailurePolicy::Apology);
        assert_eq!(c.auto_reply.apology_text, "lo sentimos");
        assert_eq!(c.auto_reply.chat_timeout_secs, 30);
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charla.toml");
        std::fs::write(&path, "[sessions]\nadmin_secret = \"s3cret\"\n").unwrap();
        let c = CharlaConfig::load(Some(&path)).unwrap();
        assert_eq!(c.sessions.admin_secret, "s3cret");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = CharlaConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(c.server.port, 3000);
    }
}
