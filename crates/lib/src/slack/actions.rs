//! Message kinds, their builders, and the handlers that deliver them.
//!
//! [`MessageKind::ALL`] is the registry: every kind has a `create_*` builder here and is
//! delivered by [`SlackHandler`] through one Web API method.

use crate::outgoing::{
    DeliveryError, DeliveryResult, HandlerMap, Next, OutgoingHandler, OutgoingMessage,
};
use crate::slack::SlackConnection;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Platform tag of messages this bridge delivers.
pub const SLACK_PLATFORM: &str = "slack";

/// Outgoing message types understood by the Slack dispatch stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Attachments,
    Reaction,
    RemoveReaction,
    UpdateText,
    UpdateAttachments,
    DeleteTextOrAttachments,
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::Text,
        MessageKind::Attachments,
        MessageKind::Reaction,
        MessageKind::RemoveReaction,
        MessageKind::UpdateText,
        MessageKind::UpdateAttachments,
        MessageKind::DeleteTextOrAttachments,
    ];

    /// Type tag carried by the message.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Attachments => "attachments",
            MessageKind::Reaction => "reaction",
            MessageKind::RemoveReaction => "remove_reaction",
            MessageKind::UpdateText => "update_text",
            MessageKind::UpdateAttachments => "update_attachments",
            MessageKind::DeleteTextOrAttachments => "delete_text_or_attachments",
        }
    }

    #[cfg(test)]
    fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }

    /// Web API method used to deliver this kind.
    pub fn api_method(self) -> &'static str {
        match self {
            MessageKind::Text | MessageKind::Attachments => "chat.postMessage",
            MessageKind::Reaction => "reactions.add",
            MessageKind::RemoveReaction => "reactions.remove",
            MessageKind::UpdateText | MessageKind::UpdateAttachments => "chat.update",
            MessageKind::DeleteTextOrAttachments => "chat.delete",
        }
    }
}

/// Handler for every kind in the registry.
pub fn default_handlers() -> HandlerMap {
    MessageKind::ALL
        .into_iter()
        .map(|kind| {
            let handler: Arc<dyn OutgoingHandler> = Arc::new(SlackHandler { kind });
            (kind.as_str().to_string(), handler)
        })
        .collect()
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, DeliveryError> {
    let v = value.trim();
    if v.is_empty() {
        Err(DeliveryError::Build(format!("{} must not be empty", what)))
    } else {
        Ok(v)
    }
}

/// Options must be a JSON object; its fields are merged into the payload.
fn merge_options(message: &mut OutgoingMessage, options: Option<&Value>) -> Result<(), DeliveryError> {
    match options {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Object(map)) => {
            for (k, v) in map {
                message.raw.entry(k.clone()).or_insert_with(|| v.clone());
            }
            Ok(())
        }
        Some(_) => Err(DeliveryError::Build("options must be a JSON object".to_string())),
    }
}

fn base(kind: MessageKind, channel: &str) -> Result<OutgoingMessage, DeliveryError> {
    let channel = required(channel, "channel")?;
    Ok(OutgoingMessage::new(kind.as_str(), SLACK_PLATFORM).with_raw("channel", channel))
}

pub fn create_text(channel: &str, text: &str, options: Option<&Value>) -> Result<OutgoingMessage, DeliveryError> {
    required(text, "text")?;
    let mut msg = base(MessageKind::Text, channel)?
        .with_text(text)
        .with_raw("text", text);
    merge_options(&mut msg, options)?;
    Ok(msg)
}

pub fn create_attachments(
    channel: &str,
    attachments: Vec<Value>,
    options: Option<&Value>,
) -> Result<OutgoingMessage, DeliveryError> {
    if attachments.is_empty() {
        return Err(DeliveryError::Build("attachments must not be empty".to_string()));
    }
    let mut msg = base(MessageKind::Attachments, channel)?
        .with_text(format!("{} attachment(s)", attachments.len()))
        .with_raw("attachments", Value::Array(attachments));
    merge_options(&mut msg, options)?;
    Ok(msg)
}

fn reaction(kind: MessageKind, name: &str, channel: &str, ts: &str) -> Result<OutgoingMessage, DeliveryError> {
    let name = required(name, "reaction name")?.trim_matches(':');
    let ts = required(ts, "timestamp")?;
    Ok(base(kind, channel)?
        .with_text(format!(":{}:", name))
        .with_raw("name", name)
        .with_raw("timestamp", ts))
}

pub fn create_reaction(name: &str, channel: &str, ts: &str) -> Result<OutgoingMessage, DeliveryError> {
    reaction(MessageKind::Reaction, name, channel, ts)
}

pub fn create_remove_reaction(name: &str, channel: &str, ts: &str) -> Result<OutgoingMessage, DeliveryError> {
    reaction(MessageKind::RemoveReaction, name, channel, ts)
}

pub fn create_update_text(
    channel: &str,
    ts: &str,
    text: &str,
    options: Option<&Value>,
) -> Result<OutgoingMessage, DeliveryError> {
    required(text, "text")?;
    let ts = required(ts, "timestamp")?;
    let mut msg = base(MessageKind::UpdateText, channel)?
        .with_text(text)
        .with_raw("ts", ts)
        .with_raw("text", text);
    merge_options(&mut msg, options)?;
    Ok(msg)
}

pub fn create_update_attachments(
    channel: &str,
    ts: &str,
    attachments: Vec<Value>,
    options: Option<&Value>,
) -> Result<OutgoingMessage, DeliveryError> {
    let ts = required(ts, "timestamp")?;
    let mut msg = base(MessageKind::UpdateAttachments, channel)?
        .with_text(format!("{} attachment(s)", attachments.len()))
        .with_raw("ts", ts)
        .with_raw("attachments", Value::Array(attachments));
    merge_options(&mut msg, options)?;
    Ok(msg)
}

pub fn create_delete_text_or_attachments(channel: &str, ts: &str) -> Result<OutgoingMessage, DeliveryError> {
    let ts = required(ts, "timestamp")?;
    Ok(base(MessageKind::DeleteTextOrAttachments, channel)?.with_raw("ts", ts))
}

/// Delivers one message kind through the matching Web API call.
pub struct SlackHandler {
    kind: MessageKind,
}

impl SlackHandler {
    async fn deliver(&self, message: &OutgoingMessage, connection: &dyn SlackConnection) -> DeliveryResult {
        let field = |key: &str| {
            message
                .raw_str(key)
                .ok_or_else(|| DeliveryError::Build(format!("{} message missing {}", self.kind.as_str(), key)))
        };
        match self.kind {
            MessageKind::Text | MessageKind::Attachments => {
                connection.post_message(Value::Object(message.raw.clone())).await
            }
            MessageKind::UpdateText | MessageKind::UpdateAttachments => {
                connection.update_message(Value::Object(message.raw.clone())).await
            }
            MessageKind::DeleteTextOrAttachments => {
                connection.delete_message(field("channel")?, field("ts")?).await
            }
            MessageKind::Reaction => {
                connection
                    .add_reaction(field("name")?, field("channel")?, field("timestamp")?)
                    .await
            }
            MessageKind::RemoveReaction => {
                connection
                    .remove_reaction(field("name")?, field("channel")?, field("timestamp")?)
                    .await
            }
        }
    }
}

#[async_trait]
impl OutgoingHandler for SlackHandler {
    async fn send(
        &self,
        message: &OutgoingMessage,
        next: Next,
        connection: Arc<dyn SlackConnection>,
    ) -> DeliveryResult {
        let result = self.deliver(message, connection.as_ref()).await;
        match &result {
            Ok(_) => {
                log::debug!("slack {} delivered via {}", self.kind.as_str(), self.kind.api_method());
                next.complete();
            }
            Err(e) => {
                log::warn!("slack {} failed via {}: {}", self.kind.as_str(), self.kind.api_method(), e);
                next.fail(e.clone());
            }
        }
        result
    }
}
