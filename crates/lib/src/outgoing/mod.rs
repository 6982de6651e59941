//! Outgoing message correlation.
//!
//! Every message handed to [`crate::bridge::Bridge::send`] gets a fresh [`MessageId`] and a
//! pending entry in the [`PendingTable`], then goes through the [`OutgoingPipeline`] out of band.
//! The dispatch stage ([`OutgoingDispatcher`]) runs the handler for the message type and settles
//! the pending entry with the handler's result. The pipeline outcome and the caller's result
//! are reported on separate channels: [`Next`] for the pipeline, the table for the caller.

mod dispatch;
mod error;
mod message;
mod pending;
mod pipeline;

pub use dispatch::{HandlerMap, OutgoingDispatcher, OutgoingHandler, DISPATCH_STAGE_NAME, DISPATCH_STAGE_ORDER};
pub use error::DeliveryError;
pub use message::{MessageId, OutgoingMessage};
pub use pending::{Delivery, DeliveryResult, PendingTable};
pub use pipeline::{Middleware, MiddlewareHandler, MiddlewareKind, Next, OutgoingPipeline, RunOutcome, StageSignal};
