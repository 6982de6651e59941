//! Slack Web API client: auth.test / workspace data on connect, chat and reactions for delivery.

use crate::config::SlackConfig;
use crate::outgoing::{DeliveryError, DeliveryResult};
use crate::slack::SlackConnection;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Page size for cursor-paginated list calls.
const PAGE_LIMIT: u32 = 200;

/// Upper bound on pages fetched per list call (50 × 200 = 10,000 entries).
const MAX_PAGES: usize = 50;

/// Workspace data loaded by `connect`.
#[derive(Debug, Default, Clone)]
struct WorkspaceCache {
    identity: Option<Value>,
    team: Option<Value>,
    users: Vec<Value>,
    channels: Vec<Value>,
    connected_at: Option<String>,
}

/// Slack connection over the Web API.
pub struct SlackClient {
    config: RwLock<SlackConfig>,
    connected: AtomicBool,
    cache: RwLock<WorkspaceCache>,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config: RwLock::new(config),
            connected: AtomicBool::new(false),
            cache: RwLock::new(WorkspaceCache::default()),
            client: reqwest::Client::new(),
        }
    }

    /// Token for read calls: API token, else bot token.
    async fn read_token(&self) -> Result<String, DeliveryError> {
        let c = self.config.read().await;
        c.api_token
            .clone()
            .or_else(|| c.bot_token.clone())
            .ok_or_else(|| DeliveryError::NotConfigured("slack api token".to_string()))
    }

    /// Token for chat/reaction calls: bot token, else API token.
    async fn write_token(&self) -> Result<String, DeliveryError> {
        let c = self.config.read().await;
        c.bot_token
            .clone()
            .or_else(|| c.api_token.clone())
            .ok_or_else(|| DeliveryError::NotConfigured("slack bot token".to_string()))
    }

    async fn method_url(&self, method: &str) -> String {
        let c = self.config.read().await;
        format!("{}/{}", slack_api_base(c.api_base.as_deref()), method)
    }

    /// GET a read method with query parameters.
    async fn api_get(&self, method: &str, query: &[(&str, String)]) -> Result<Value, DeliveryError> {
        let token = self.read_token().await?;
        let url = self.method_url(method).await;
        let res = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        read_reply(method, res).await
    }

    /// POST a write method with a JSON body.
    async fn api_post(&self, method: &str, body: Value) -> Result<Value, DeliveryError> {
        let token = self.write_token().await?;
        let url = self.method_url(method).await;
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        read_reply(method, res).await
    }

    /// Follow `response_metadata.next_cursor` and collect `key` arrays from every page.
    async fn api_list(
        &self,
        method: &str,
        key: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<Value>, DeliveryError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut query: Vec<(&str, String)> = extra.to_vec();
            query.push(("limit", PAGE_LIMIT.to_string()));
            if let Some(ref c) = cursor {
                query.push(("cursor", c.clone()));
            }
            let page = self.api_get(method, &query).await?;
            if let Some(items) = page.get(key).and_then(|v| v.as_array()) {
                out.extend(items.iter().cloned());
            }
            cursor = page
                .get("response_metadata")
                .and_then(|m| m.get("next_cursor"))
                .and_then(|c| c.as_str())
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                return Ok(out);
            }
        }
        log::warn!("{}: stopped after {} pages", method, MAX_PAGES);
        Ok(out)
    }

    async fn fetch_users(&self) -> Result<Vec<Value>, DeliveryError> {
        self.api_list("users.list", "members", &[]).await
    }

    async fn fetch_channels(&self) -> Result<Vec<Value>, DeliveryError> {
        self.api_list(
            "conversations.list",
            "channels",
            &[
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
            ],
        )
        .await
    }

    async fn fetch_team(&self) -> Result<Value, DeliveryError> {
        let reply = self.api_get("team.info", &[]).await?;
        Ok(reply.get("team").cloned().unwrap_or(Value::Null))
    }
}

/// Resolve the Web API base URL: config override, then SLACK_API_BASE env, then slack.com.
pub fn slack_api_base(configured: Option<&str>) -> String {
    configured
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            std::env::var("SLACK_API_BASE")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| SLACK_API_BASE.to_string())
}

/// Non-2xx is a network error; `ok: false` is an API error carrying Slack's `error` code.
async fn read_reply(method: &str, res: reqwest::Response) -> Result<Value, DeliveryError> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(DeliveryError::Network(format!("{} failed: {} {}", method, status, body)));
    }
    let reply: Value = res
        .json()
        .await
        .map_err(|e| DeliveryError::Network(format!("{}: invalid JSON reply: {}", method, e)))?;
    check_reply(reply)
}

fn check_reply(reply: Value) -> Result<Value, DeliveryError> {
    if reply.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
        Ok(reply)
    } else {
        let error = reply
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown_error");
        Err(DeliveryError::Api(error.to_string()))
    }
}

#[async_trait]
impl SlackConnection for SlackClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), DeliveryError> {
        self.connected.store(false, Ordering::SeqCst);
        let identity = self.api_get("auth.test", &[]).await?;
        let (team, users, channels) =
            futures_util::try_join!(self.fetch_team(), self.fetch_users(), self.fetch_channels())?;
        log::info!(
            "slack connected as {} ({} users, {} channels)",
            identity.get("user").and_then(|v| v.as_str()).unwrap_or("?"),
            users.len(),
            channels.len()
        );
        *self.cache.write().await = WorkspaceCache {
            identity: Some(identity),
            team: Some(team),
            users,
            channels,
            connected_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn set_config(&self, config: SlackConfig) {
        *self.config.write().await = config;
        self.connected.store(false, Ordering::SeqCst);
        log::debug!("slack config replaced; reconnect required");
    }

    async fn get_user_profile(&self, id: &str) -> Result<Value, DeliveryError> {
        let reply = self.api_get("users.info", &[("user", id.to_string())]).await?;
        Ok(reply.get("user").cloned().unwrap_or(Value::Null))
    }

    async fn get_users(&self) -> Result<Value, DeliveryError> {
        let cache = self.cache.read().await;
        if cache.identity.is_none() {
            return Err(DeliveryError::NotConnected);
        }
        Ok(Value::Array(cache.users.clone()))
    }

    async fn get_channels(&self) -> Result<Value, DeliveryError> {
        let channels = self.fetch_channels().await?;
        self.cache.write().await.channels = channels.clone();
        Ok(Value::Array(channels))
    }

    async fn get_team(&self) -> Result<Value, DeliveryError> {
        self.cache
            .read()
            .await
            .team
            .clone()
            .ok_or(DeliveryError::NotConnected)
    }

    async fn get_data(&self) -> Result<Value, DeliveryError> {
        let cache = self.cache.read().await;
        let Some(ref identity) = cache.identity else {
            return Err(DeliveryError::NotConnected);
        };
        Ok(json!({
            "self": identity,
            "team": cache.team,
            "users": cache.users,
            "channels": cache.channels,
            "connectedAt": cache.connected_at,
        }))
    }

    async fn post_message(&self, payload: Value) -> DeliveryResult {
        self.api_post("chat.postMessage", payload).await
    }

    async fn update_message(&self, payload: Value) -> DeliveryResult {
        self.api_post("chat.update", payload).await
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> DeliveryResult {
        self.api_post("chat.delete", json!({ "channel": channel, "ts": ts }))
            .await
    }

    async fn add_reaction(&self, name: &str, channel: &str, ts: &str) -> DeliveryResult {
        self.api_post(
            "reactions.add",
            json!({ "name": name, "channel": channel, "timestamp": ts }),
        )
        .await
    }

    async fn remove_reaction(&self, name: &str, channel: &str, ts: &str) -> DeliveryResult {
        self.api_post(
            "reactions.remove",
            json!({ "name": name, "channel": channel, "timestamp": ts }),
        )
        .await
    }
}
