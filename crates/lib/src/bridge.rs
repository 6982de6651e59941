//! The bridge: owns the pending table, the outgoing pipeline and the live Slack connection,
//! and exposes the typed `send_*` operations.

use crate::config::SlackConfig;
use crate::outgoing::{
    Delivery, DeliveryError, HandlerMap, Middleware, MiddlewareKind, OutgoingDispatcher,
    OutgoingMessage, OutgoingPipeline, PendingTable, DISPATCH_STAGE_NAME, DISPATCH_STAGE_ORDER,
};
use crate::slack::{self, ConnectionSlot, SlackConnection, SLACK_PLATFORM};
use serde_json::Value;
use std::sync::Arc;

/// Slack integration object. Sends are correlated through its own [`PendingTable`]; nothing
/// is process-global.
pub struct Bridge {
    pending: PendingTable,
    pipeline: OutgoingPipeline,
    connection: ConnectionSlot,
}

impl Bridge {
    /// Bridge with the built-in Slack handlers for every message kind.
    pub async fn new() -> Self {
        Self::with_handlers(slack::default_handlers()).await
    }

    /// Bridge whose dispatch stage uses `handlers` (type tag -> handler).
    pub async fn with_handlers(handlers: HandlerMap) -> Self {
        Self::with_pipeline(OutgoingPipeline::new(), handlers).await
    }

    /// Register the dispatch stage on an existing pipeline, next to whatever stages it already has.
    pub async fn with_pipeline(pipeline: OutgoingPipeline, handlers: HandlerMap) -> Self {
        let pending = PendingTable::new();
        let connection = ConnectionSlot::new();
        let dispatcher = OutgoingDispatcher::new(
            SLACK_PLATFORM,
            handlers,
            pending.clone(),
            connection.clone(),
        );
        pipeline
            .register(Middleware {
                name: DISPATCH_STAGE_NAME.to_string(),
                kind: MiddlewareKind::Outgoing,
                order: DISPATCH_STAGE_ORDER,
                description: "Sends out messages that target platform = slack. Swallows events once sent."
                    .to_string(),
                handler: Arc::new(dispatcher),
            })
            .await;
        Self {
            pending,
            pipeline,
            connection,
        }
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn pipeline(&self) -> &OutgoingPipeline {
        &self.pipeline
    }

    /// Install a new live connection. Sends already dispatched keep the one they started with.
    pub async fn set_connection(&self, connection: Arc<dyn SlackConnection>) {
        if self.connection.replace(connection).await.is_some() {
            log::debug!("slack connection replaced");
        }
    }

    pub async fn connection(&self) -> Result<Arc<dyn SlackConnection>, DeliveryError> {
        self.connection.current().await.ok_or(DeliveryError::NotConnected)
    }

    /// Stamp `message` with an id, register it, and push it through the pipeline.
    ///
    /// Registration and submission happen before this returns; the [`Delivery`] resolves
    /// with the handler's result.
    ///
    /// Must be called from within a Tokio runtime: submission spawns the pipeline run.
    /// The typed `send_*` methods below share this requirement.
    pub fn send(&self, mut message: OutgoingMessage) -> Delivery {
        let id = message.stamp();
        let delivery = match self.pending.register(id, &message) {
            Ok(d) => d,
            Err(e) => {
                log::error!("outgoing {} not sent: {}", message.kind, e);
                return Delivery::rejected(Some(id), e);
            }
        };
        log::debug!("outgoing {} queued as {}", message.kind, id);
        self.pipeline.send_outgoing(message);
        delivery
    }

    fn send_built(&self, built: Result<OutgoingMessage, DeliveryError>) -> Delivery {
        match built {
            Ok(message) => self.send(message),
            Err(e) => Delivery::rejected(None, e),
        }
    }

    pub fn send_text(&self, channel: &str, text: &str, options: Option<&Value>) -> Delivery {
        self.send_built(slack::create_text(channel, text, options))
    }

    pub fn send_attachments(&self, channel: &str, attachments: Vec<Value>, options: Option<&Value>) -> Delivery {
        self.send_built(slack::create_attachments(channel, attachments, options))
    }

    pub fn send_reaction(&self, name: &str, channel: &str, ts: &str) -> Delivery {
        self.send_built(slack::create_reaction(name, channel, ts))
    }

    pub fn send_remove_reaction(&self, name: &str, channel: &str, ts: &str) -> Delivery {
        self.send_built(slack::create_remove_reaction(name, channel, ts))
    }

    pub fn send_update_text(&self, channel: &str, ts: &str, text: &str, options: Option<&Value>) -> Delivery {
        self.send_built(slack::create_update_text(channel, ts, text, options))
    }

    pub fn send_update_attachments(
        &self,
        channel: &str,
        ts: &str,
        attachments: Vec<Value>,
        options: Option<&Value>,
    ) -> Delivery {
        self.send_built(slack::create_update_attachments(channel, ts, attachments, options))
    }

    pub fn send_delete_text_or_attachments(&self, channel: &str, ts: &str) -> Delivery {
        self.send_built(slack::create_delete_text_or_attachments(channel, ts))
    }

    pub async fn is_connected(&self) -> bool {
        match self.connection.current().await {
            Some(c) => c.is_connected(),
            None => false,
        }
    }

    pub async fn get_user_profile(&self, id: &str) -> Result<Value, DeliveryError> {
        self.connection().await?.get_user_profile(id).await
    }

    pub async fn get_users(&self) -> Result<Value, DeliveryError> {
        self.connection().await?.get_users().await
    }

    pub async fn get_channels(&self) -> Result<Value, DeliveryError> {
        self.connection().await?.get_channels().await
    }

    pub async fn get_team(&self) -> Result<Value, DeliveryError> {
        self.connection().await?.get_team().await
    }

    pub async fn get_data(&self) -> Result<Value, DeliveryError> {
        self.connection().await?.get_data().await
    }

    /// Apply new settings to the live connection and reconnect.
    pub async fn reconfigure(&self, config: SlackConfig) -> Result<(), DeliveryError> {
        let connection = self.connection().await?;
        connection.set_config(config).await;
        connection.connect().await
    }
}
