//! Outgoing message and its correlation id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Correlation id linking a sent message to its delivery outcome (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message on its way out: type tag, platform tag and the platform payload (`raw`).
///
/// The id is only set by [`OutgoingMessage::stamp`]; once set it never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(rename = "__id", default, skip_serializing_if = "Option::is_none")]
    id: Option<MessageId>,
    /// Selects the handler in the dispatch stage (e.g. "text", "reaction").
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: String,
    /// Human-readable text, for logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Platform payload sent as-is by the handler.
    #[serde(default)]
    pub raw: Map<String, Value>,
}

impl OutgoingMessage {
    pub fn new(kind: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            platform: platform.into(),
            text: None,
            raw: Map::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_raw(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.raw.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<MessageId> {
        self.id
    }

    /// Assign a fresh id unless one is already set; returns the id in effect.
    pub fn stamp(&mut self) -> MessageId {
        *self.id.get_or_insert_with(MessageId::new)
    }

    /// String field from the raw payload.
    pub fn raw_str(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_assigns_once() {
        let mut msg = OutgoingMessage::new("text", "slack");
        assert!(msg.id().is_none());
        let first = msg.stamp();
        let second = msg.stamp();
        assert_eq!(first, second);
        assert_eq!(msg.id(), Some(first));
    }

    #[test]
    fn ids_are_unique() {
        let ids: std::collections::HashSet<MessageId> = (0..1000).map(|_| MessageId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn serializes_type_and_id_fields() {
        let mut msg = OutgoingMessage::new("text", "slack").with_raw("channel", "C1");
        let id = msg.stamp();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["platform"], "slack");
        assert_eq!(json["__id"], id.to_string());
        assert_eq!(json["raw"]["channel"], "C1");
    }
}
