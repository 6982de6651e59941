//! Dispatch stage: picks the handler for a message type, runs it, and settles the pending entry.

use crate::outgoing::{
    DeliveryError, DeliveryResult, MiddlewareHandler, Next, OutgoingMessage, PendingTable,
};
use crate::slack::{ConnectionSlot, SlackConnection};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Name the dispatch stage registers under.
pub const DISPATCH_STAGE_NAME: &str = "slack.sendMessages";

/// Dispatch runs late: it consumes every message it handles.
pub const DISPATCH_STAGE_ORDER: i32 = 100;

/// Delivers one message type to the platform.
///
/// Signals the pipeline through `next` (`complete` or `fail`) and returns the outcome for the caller.
#[async_trait]
pub trait OutgoingHandler: Send + Sync {
    async fn send(
        &self,
        message: &OutgoingMessage,
        next: Next,
        connection: Arc<dyn SlackConnection>,
    ) -> DeliveryResult;
}

/// Type tag -> handler.
pub type HandlerMap = HashMap<String, Arc<dyn OutgoingHandler>>;

/// The platform's stage in the outgoing pipeline.
pub struct OutgoingDispatcher {
    platform: String,
    handlers: HandlerMap,
    pending: PendingTable,
    connection: ConnectionSlot,
}

impl OutgoingDispatcher {
    pub fn new(
        platform: impl Into<String>,
        handlers: HandlerMap,
        pending: PendingTable,
        connection: ConnectionSlot,
    ) -> Self {
        Self {
            platform: platform.into(),
            handlers,
            pending,
            connection,
        }
    }

    /// Handle one outgoing event.
    ///
    /// Other platforms are passed on untouched. An unknown type fails the stage and rejects the
    /// sender's delivery. Otherwise the handler runs on a spawned task and its result settles the
    /// pending entry for the message id.
    pub fn process(&self, message: OutgoingMessage, next: Next) {
        if message.platform != self.platform {
            next.pass();
            return;
        }

        let Some(handler) = self.handlers.get(&message.kind).cloned() else {
            let error = DeliveryError::UnsupportedType(message.kind.clone());
            if let Some(id) = message.id() {
                self.pending.settle(&id, Err(error.clone()));
            }
            next.fail(error);
            return;
        };

        let pending = self.pending.clone();
        let slot = self.connection.clone();
        tokio::spawn(async move {
            let outcome = match slot.current().await {
                Some(connection) => run_handler(handler, &message, next, connection).await,
                None => {
                    next.fail(DeliveryError::NotConnected);
                    Err(DeliveryError::NotConnected)
                }
            };
            match message.id() {
                Some(id) => {
                    if !pending.settle(&id, outcome) {
                        log::debug!("outgoing {}: no pending entry for {}", message.kind, id);
                    }
                }
                None => {
                    if let Err(e) = outcome {
                        log::warn!("outgoing {} without id failed: {}", message.kind, e);
                    }
                }
            }
        });
    }
}

/// Run `handler` on its own task so a panic still yields a result to settle with.
///
/// `next` unwinds with the handler, so the pipeline sees the stage as swallowed.
async fn run_handler(
    handler: Arc<dyn OutgoingHandler>,
    message: &OutgoingMessage,
    next: Next,
    connection: Arc<dyn SlackConnection>,
) -> DeliveryResult {
    let stage = next.stage().to_string();
    let owned = message.clone();
    let task = tokio::spawn(async move { handler.send(&owned, next, connection).await });
    match task.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            log::error!("{}: handler for {} panicked", stage, message.kind);
            Err(DeliveryError::HandlerPanicked(message.kind.clone()))
        }
        Err(_) => Err(DeliveryError::Dropped),
    }
}

impl MiddlewareHandler for OutgoingDispatcher {
    fn handle(&self, event: OutgoingMessage, next: Next) {
        self.process(event, next);
    }
}
