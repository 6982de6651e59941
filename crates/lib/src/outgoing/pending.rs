//! Pending-correlation table: message id -> the caller waiting on that message.
//!
//! `register` hands back a [`Delivery`] future; `settle` completes it exactly once and drops
//! the entry. Settling an unknown or already-settled id does nothing.

use crate::outgoing::{DeliveryError, MessageId, OutgoingMessage};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;

/// What a send resolves to: the platform reply or the reason it failed.
pub type DeliveryResult = Result<Value, DeliveryError>;

struct PendingEntry {
    sender: oneshot::Sender<DeliveryResult>,
    /// Type tag of the original message, kept for diagnostics.
    kind: String,
    registered_at: Instant,
}

/// Outstanding deliveries keyed by message id. Cheap to clone; clones share the table.
#[derive(Clone, Default)]
pub struct PendingTable {
    inner: Arc<Mutex<HashMap<MessageId, PendingEntry>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MessageId, PendingEntry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a pending entry for `id`. Fails if an entry for `id` is already waiting.
    pub fn register(&self, id: MessageId, message: &OutgoingMessage) -> Result<Delivery, DeliveryError> {
        let mut g = self.lock();
        if g.contains_key(&id) {
            return Err(DeliveryError::DuplicateId(id));
        }
        let (sender, receiver) = oneshot::channel();
        g.insert(
            id,
            PendingEntry {
                sender,
                kind: message.kind.clone(),
                registered_at: Instant::now(),
            },
        );
        Ok(Delivery {
            id: Some(id),
            state: DeliveryState::Waiting(receiver),
        })
    }

    /// Complete the entry for `id` with `outcome` and remove it.
    /// Returns false (and does nothing) when no entry is waiting for `id`.
    pub fn settle(&self, id: &MessageId, outcome: DeliveryResult) -> bool {
        let Some(entry) = self.lock().remove(id) else {
            return false;
        };
        let ok = outcome.is_ok();
        if entry.sender.send(outcome).is_err() {
            log::debug!("outgoing {} ({}) settled after caller dropped its delivery", id, entry.kind);
        } else {
            log::debug!(
                "outgoing {} ({}) {} after {:?}",
                id,
                entry.kind,
                if ok { "resolved" } else { "rejected" },
                entry.registered_at.elapsed()
            );
        }
        true
    }

    pub fn has(&self, id: &MessageId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

enum DeliveryState {
    Waiting(oneshot::Receiver<DeliveryResult>),
    Ready(Option<DeliveryResult>),
}

/// Future returned by every send: resolves once the message's pending entry is settled.
///
/// Dropping it does not cancel the send; the entry is still settled (and discarded) later.
pub struct Delivery {
    id: Option<MessageId>,
    state: DeliveryState,
}

impl Delivery {
    /// A delivery that is already failed, for sends rejected before registration.
    pub fn rejected(id: Option<MessageId>, error: DeliveryError) -> Self {
        Self {
            id,
            state: DeliveryState::Ready(Some(Err(error))),
        }
    }

    /// Id of the message this delivery waits on (None when the message was never built).
    pub fn id(&self) -> Option<MessageId> {
        self.id
    }
}

impl Future for Delivery {
    type Output = DeliveryResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            DeliveryState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|r| r.unwrap_or(Err(DeliveryError::Dropped))),
            DeliveryState::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(DeliveryError::Dropped)))
            }
        }
    }
}
