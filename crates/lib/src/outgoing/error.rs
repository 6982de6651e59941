//! Delivery errors shared by the pipeline, the pending table and the Slack client.

use crate::outgoing::MessageId;
use thiserror::Error;

/// Why an outgoing message was not delivered.
///
/// Cloneable because the same error can be reported to both the pipeline (`Next::fail`)
/// and the caller awaiting the [`crate::outgoing::Delivery`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No handler is registered for the message type.
    #[error("unsupported event type: {0}")]
    UnsupportedType(String),

    /// Transport failure or non-2xx HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// Slack answered with `ok: false`.
    #[error("slack api error: {0}")]
    Api(String),

    /// No live Slack connection was available when the handler ran.
    #[error("slack connection not established")]
    NotConnected,

    /// A required token or setting is missing.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// A message builder rejected its input.
    #[error("invalid message: {0}")]
    Build(String),

    /// The handler for this message type panicked before returning a result.
    #[error("handler for {0} panicked")]
    HandlerPanicked(String),

    /// A pending entry already exists for this id.
    #[error("duplicate message id: {0}")]
    DuplicateId(MessageId),

    /// The pending entry went away without being settled (e.g. runtime shutdown).
    #[error("delivery dropped before settlement")]
    Dropped,
}
