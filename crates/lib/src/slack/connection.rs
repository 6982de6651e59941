//! Slack connection capability surface and the replaceable slot holding the live connection.

use crate::config::SlackConfig;
use crate::outgoing::{DeliveryError, DeliveryResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What the bridge needs from a Slack connection: workspace queries, lifecycle, and the
/// Web API calls the outgoing handlers make.
#[async_trait]
pub trait SlackConnection: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Authenticate and load workspace data (team, users, channels).
    async fn connect(&self) -> Result<(), DeliveryError>;

    /// Replace tokens/settings. The connection is considered disconnected until `connect` runs again.
    async fn set_config(&self, config: SlackConfig);

    async fn get_user_profile(&self, id: &str) -> Result<Value, DeliveryError>;
    async fn get_users(&self) -> Result<Value, DeliveryError>;
    async fn get_channels(&self) -> Result<Value, DeliveryError>;
    async fn get_team(&self) -> Result<Value, DeliveryError>;
    /// Snapshot of everything loaded by `connect`.
    async fn get_data(&self) -> Result<Value, DeliveryError>;

    /// chat.postMessage with the given payload (channel, text and/or attachments, options).
    async fn post_message(&self, payload: Value) -> DeliveryResult;
    /// chat.update with the given payload (channel, ts, text and/or attachments).
    async fn update_message(&self, payload: Value) -> DeliveryResult;
    async fn delete_message(&self, channel: &str, ts: &str) -> DeliveryResult;
    async fn add_reaction(&self, name: &str, channel: &str, ts: &str) -> DeliveryResult;
    async fn remove_reaction(&self, name: &str, channel: &str, ts: &str) -> DeliveryResult;
}

/// Holder for the live connection. Readers get the connection current at read time, so
/// replacing it (e.g. on reconfigure) does not affect sends already in flight.
#[derive(Clone, Default)]
pub struct ConnectionSlot {
    inner: Arc<RwLock<Option<Arc<dyn SlackConnection>>>>,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<dyn SlackConnection>> {
        self.inner.read().await.clone()
    }

    /// Install `connection`; returns the one it replaced.
    pub async fn replace(&self, connection: Arc<dyn SlackConnection>) -> Option<Arc<dyn SlackConnection>> {
        self.inner.write().await.replace(connection)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::json;

    /// Connection that accepts everything and returns `{ "ok": true }`.
    pub(crate) struct NullConnection;

    #[async_trait]
    impl SlackConnection for NullConnection {
        fn is_connected(&self) -> bool {
            true
        }
        async fn connect(&self) -> Result<(), DeliveryError> {
            Ok(())
        }
        async fn set_config(&self, _config: SlackConfig) {}
        async fn get_user_profile(&self, id: &str) -> Result<Value, DeliveryError> {
            Ok(json!({ "id": id }))
        }
        async fn get_users(&self) -> Result<Value, DeliveryError> {
            Ok(json!([]))
        }
        async fn get_channels(&self) -> Result<Value, DeliveryError> {
            Ok(json!([]))
        }
        async fn get_team(&self) -> Result<Value, DeliveryError> {
            Ok(json!({}))
        }
        async fn get_data(&self) -> Result<Value, DeliveryError> {
            Ok(json!({}))
        }
        async fn post_message(&self, _payload: Value) -> DeliveryResult {
            Ok(json!({ "ok": true }))
        }
        async fn update_message(&self, _payload: Value) -> DeliveryResult {
            Ok(json!({ "ok": true }))
        }
        async fn delete_message(&self, _channel: &str, _ts: &str) -> DeliveryResult {
            Ok(json!({ "ok": true }))
        }
        async fn add_reaction(&self, _name: &str, _channel: &str, _ts: &str) -> DeliveryResult {
            Ok(json!({ "ok": true }))
        }
        async fn remove_reaction(&self, _name: &str, _channel: &str, _ts: &str) -> DeliveryResult {
            Ok(json!({ "ok": true }))
        }
    }

    /// Connection that records every Web API call as `(method, payload)`.
    #[derive(Default)]
    pub(crate) struct RecordingConnection {
        pub(crate) calls: std::sync::Mutex<Vec<(String, Value)>>,
    }

    impl RecordingConnection {
        fn record(&self, method: &str, payload: Value) -> DeliveryResult {
            self.calls.lock().unwrap().push((method.to_string(), payload));
            Ok(json!({ "ok": true, "method": method }))
        }
    }

    #[async_trait]
    impl SlackConnection for RecordingConnection {
        fn is_connected(&self) -> bool {
            true
        }
        async fn connect(&self) -> Result<(), DeliveryError> {
            Ok(())
        }
        async fn set_config(&self, _config: SlackConfig) {}
        async fn get_user_profile(&self, id: &str) -> Result<Value, DeliveryError> {
            Ok(json!({ "id": id }))
        }
        async fn get_users(&self) -> Result<Value, DeliveryError> {
            Ok(json!([]))
        }
        async fn get_channels(&self) -> Result<Value, DeliveryError> {
            Ok(json!([]))
        }
        async fn get_team(&self) -> Result<Value, DeliveryError> {
            Ok(json!({}))
        }
        async fn get_data(&self) -> Result<Value, DeliveryError> {
            Ok(json!({}))
        }
        async fn post_message(&self, payload: Value) -> DeliveryResult {
            self.record("chat.postMessage", payload)
        }
        async fn update_message(&self, payload: Value) -> DeliveryResult {
            self.record("chat.update", payload)
        }
        async fn delete_message(&self, channel: &str, ts: &str) -> DeliveryResult {
            self.record("chat.delete", json!({ "channel": channel, "ts": ts }))
        }
        async fn add_reaction(&self, name: &str, channel: &str, ts: &str) -> DeliveryResult {
            self.record(
                "reactions.add",
                json!({ "name": name, "channel": channel, "timestamp": ts }),
            )
        }
        async fn remove_reaction(&self, name: &str, channel: &str, ts: &str) -> DeliveryResult {
            self.record(
                "reactions.remove",
                json!({ "name": name, "channel": channel, "timestamp": ts }),
            )
        }
    }
}
