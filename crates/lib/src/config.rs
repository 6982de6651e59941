//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.slack-bridge/config.json`) and environment.
//! Every Slack setting has an env override (`SLACK_*`), applied by [`resolve_slack_config`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Slack credentials and OAuth settings.
    #[serde(default)]
    pub slack: SlackConfig,
}

/// HTTP bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the HTTP routes (default 15152).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    15152
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Default OAuth scope requested for the Slack app.
pub const DEFAULT_SLACK_SCOPE: &str =
    "admin,bot,chat:write:bot,commands,identify,incoming-webhook,channels:read";

/// Slack settings. Each field is overridden by its env var when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Workspace API token (SLACK_API_TOKEN). Used for read calls.
    pub api_token: Option<String>,
    /// Bot token (SLACK_BOT_TOKEN). Used for chat and reactions.
    pub bot_token: Option<String>,
    /// OAuth client id (SLACK_CLIENT_ID).
    pub client_id: Option<String>,
    /// OAuth client secret (SLACK_CLIENT_SECRET).
    pub client_secret: Option<String>,
    /// Public host name the Slack app calls back to (SLACK_HOST).
    pub hostname: Option<String>,
    /// Request verification token (SLACK_VERIFICATION_TOKEN).
    pub verification_token: Option<String>,
    /// OAuth scope (SLACK_SCOPE).
    #[serde(default = "default_slack_scope")]
    pub scope: String,
    /// Web API base URL override (tests, proxies). Falls back to SLACK_API_BASE, then slack.com.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

fn default_slack_scope() -> String {
    DEFAULT_SLACK_SCOPE.to_string()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            bot_token: None,
            client_id: None,
            client_secret: None,
            hostname: None,
            verification_token: None,
            scope: default_slack_scope(),
            api_base: None,
        }
    }
}

/// Trimmed, non-empty value of env var `name`.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Env var `name` overrides the configured value; blank config values count as unset.
fn env_or(name: &str, configured: &Option<String>) -> Option<String> {
    env_value(name).or_else(|| {
        configured
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the effective Slack settings: env vars override the config file.
pub fn resolve_slack_config(config: &Config) -> SlackConfig {
    let s = &config.slack;
    SlackConfig {
        api_token: env_or("SLACK_API_TOKEN", &s.api_token),
        bot_token: env_or("SLACK_BOT_TOKEN", &s.bot_token),
        client_id: env_or("SLACK_CLIENT_ID", &s.client_id),
        client_secret: env_or("SLACK_CLIENT_SECRET", &s.client_secret),
        hostname: env_or("SLACK_HOST", &s.hostname),
        verification_token: env_or("SLACK_VERIFICATION_TOKEN", &s.verification_token),
        scope: env_value("SLACK_SCOPE")
            .or_else(|| Some(s.scope.trim().to_string()).filter(|v| !v.is_empty()))
            .unwrap_or_else(default_slack_scope),
        api_base: s.api_base.clone(),
    }
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SLACK_BRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".slack-bridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used, so it can be saved back later.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Write config as pretty JSON, creating the parent directory if needed.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let s = serde_json::to_string_pretty(config).context("serializing config")?;
    std::fs::write(path, s).with_context(|| format!("writing config to {}", path.display()))?;
    Ok(())
}
