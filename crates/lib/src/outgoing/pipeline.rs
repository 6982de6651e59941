//! Outgoing middleware pipeline: ordered stages, each handed a one-shot [`Next`].
//!
//! A stage either passes the event on, completes it (consumed, chain stops), or fails it.
//! Dropping `Next` without signalling also stops the chain.

use crate::outgoing::{DeliveryError, OutgoingMessage};
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;

/// Which event stream a middleware is attached to. Only `Outgoing` stages see sent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewareKind {
    Incoming,
    Outgoing,
}

/// Stage implementation. Must signal through `next` eventually (or drop it to swallow the event).
pub trait MiddlewareHandler: Send + Sync {
    fn handle(&self, event: OutgoingMessage, next: Next);
}

/// A registered stage.
#[derive(Clone)]
pub struct Middleware {
    pub name: String,
    pub kind: MiddlewareKind,
    /// Lower runs first.
    pub order: i32,
    pub description: String,
    pub handler: Arc<dyn MiddlewareHandler>,
}

/// Signal a stage sends back to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSignal {
    Pass,
    Complete,
    Fail(DeliveryError),
}

/// One-shot continuation given to a stage.
pub struct Next {
    stage: String,
    tx: oneshot::Sender<StageSignal>,
}

impl Next {
    /// Build a continuation for `stage`; the receiver gets the stage's signal.
    pub fn new(stage: impl Into<String>) -> (Self, oneshot::Receiver<StageSignal>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                stage: stage.into(),
                tx,
            },
            rx,
        )
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Defer to the next stage.
    pub fn pass(self) {
        self.signal(StageSignal::Pass);
    }

    /// The event was handled here; later stages do not see it.
    pub fn complete(self) {
        self.signal(StageSignal::Complete);
    }

    /// Fail the event at this stage.
    pub fn fail(self, error: DeliveryError) {
        self.signal(StageSignal::Fail(error));
    }

    fn signal(self, signal: StageSignal) {
        if self.tx.send(signal).is_err() {
            log::debug!("pipeline stage {}: runner gone, signal dropped", self.stage);
        }
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage passed; nobody consumed the event.
    Passed,
    Completed { stage: String },
    Failed { stage: String, error: DeliveryError },
    /// A stage dropped its `Next` without signalling.
    Swallowed { stage: String },
}

/// Middleware registry and runner. Clones share the registry.
#[derive(Clone, Default)]
pub struct OutgoingPipeline {
    stages: Arc<RwLock<Vec<Middleware>>>,
}

impl OutgoingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage, keeping stages sorted by order. A stage with the same name is replaced.
    pub async fn register(&self, middleware: Middleware) {
        let mut g = self.stages.write().await;
        if let Some(pos) = g.iter().position(|m| m.name == middleware.name) {
            log::warn!("middleware {} registered twice, replacing", middleware.name);
            g.remove(pos);
        }
        log::debug!(
            "middleware registered: {} ({:?}, order {})",
            middleware.name,
            middleware.kind,
            middleware.order
        );
        g.push(middleware);
        g.sort_by_key(|m| m.order);
    }

    /// Names of registered stages in run order.
    pub async fn names(&self) -> Vec<String> {
        self.stages.read().await.iter().map(|m| m.name.clone()).collect()
    }

    /// Push an event through the outgoing stages in the background.
    pub fn send_outgoing(&self, event: OutgoingMessage) -> JoinHandle<RunOutcome> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_outgoing(event).await })
    }

    /// Run the outgoing stages for `event` and report how the run ended.
    pub async fn run_outgoing(&self, event: OutgoingMessage) -> RunOutcome {
        let stages: Vec<(String, Arc<dyn MiddlewareHandler>)> = self
            .stages
            .read()
            .await
            .iter()
            .filter(|m| m.kind == MiddlewareKind::Outgoing)
            .map(|m| (m.name.clone(), m.handler.clone()))
            .collect();

        for (name, handler) in stages {
            let (next, rx) = Next::new(name.clone());
            handler.handle(event.clone(), next);
            match rx.await {
                Ok(StageSignal::Pass) => continue,
                Ok(StageSignal::Complete) => return RunOutcome::Completed { stage: name },
                Ok(StageSignal::Fail(error)) => {
                    log::warn!("outgoing {} failed at {}: {}", event.kind, name, error);
                    return RunOutcome::Failed { stage: name, error };
                }
                Err(_) => {
                    log::debug!("outgoing {} swallowed by {}", event.kind, name);
                    return RunOutcome::Swallowed { stage: name };
                }
            }
        }
        log::debug!(
            "outgoing {} for platform {} passed every stage",
            event.kind,
            event.platform
        );
        RunOutcome::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the stage name, then signals according to `action`.
    struct Recording {
        name: &'static str,
        action: fn(Next),
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MiddlewareHandler for Recording {
        fn handle(&self, _event: OutgoingMessage, next: Next) {
            self.seen.lock().unwrap().push(self.name);
            (self.action)(next);
        }
    }

    fn stage(
        name: &'static str,
        order: i32,
        action: fn(Next),
        seen: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Middleware {
        Middleware {
            name: name.to_string(),
            kind: MiddlewareKind::Outgoing,
            order,
            description: String::new(),
            handler: Arc::new(Recording {
                name,
                action,
                seen: seen.clone(),
            }),
        }
    }

    fn event() -> OutgoingMessage {
        OutgoingMessage::new("text", "slack")
    }

    #[tokio::test]
    async fn stages_run_in_order_until_complete() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = OutgoingPipeline::new();
        pipeline.register(stage("last", 200, |n| n.pass(), &seen)).await;
        pipeline.register(stage("first", 10, |n| n.pass(), &seen)).await;
        pipeline.register(stage("sender", 100, |n| n.complete(), &seen)).await;

        let outcome = pipeline.run_outgoing(event()).await;
        assert_eq!(outcome, RunOutcome::Completed { stage: "sender".into() });
        assert_eq!(*seen.lock().unwrap(), vec!["first", "sender"]);
        assert_eq!(pipeline.names().await, vec!["first", "sender", "last"]);
    }

    #[tokio::test]
    async fn fail_stops_the_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = OutgoingPipeline::new();
        pipeline
            .register(stage("bad", 1, |n| n.fail(DeliveryError::UnsupportedType("x".into())), &seen))
            .await;
        pipeline.register(stage("after", 2, |n| n.pass(), &seen)).await;

        let outcome = pipeline.run_outgoing(event()).await;
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                stage: "bad".into(),
                error: DeliveryError::UnsupportedType("x".into())
            }
        );
        assert_eq!(*seen.lock().unwrap(), vec!["bad"]);
    }

    #[tokio::test]
    async fn dropped_next_swallows_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = OutgoingPipeline::new();
        pipeline.register(stage("sink", 1, drop, &seen)).await;
        pipeline.register(stage("after", 2, |n| n.pass(), &seen)).await;

        let outcome = pipeline.run_outgoing(event()).await;
        assert_eq!(outcome, RunOutcome::Swallowed { stage: "sink".into() });
        assert_eq!(*seen.lock().unwrap(), vec!["sink"]);
    }

    #[tokio::test]
    async fn incoming_stages_are_skipped_and_all_pass() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = OutgoingPipeline::new();
        let mut incoming = stage("incoming", 1, |n| n.complete(), &seen);
        incoming.kind = MiddlewareKind::Incoming;
        pipeline.register(incoming).await;
        pipeline.register(stage("noop", 2, |n| n.pass(), &seen)).await;

        let outcome = pipeline.send_outgoing(event()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Passed);
        assert_eq!(*seen.lock().unwrap(), vec!["noop"]);
    }

    #[tokio::test]
    async fn same_name_replaces_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = OutgoingPipeline::new();
        pipeline.register(stage("s", 1, |n| n.pass(), &seen)).await;
        pipeline.register(stage("s", 5, |n| n.complete(), &seen)).await;
        assert_eq!(pipeline.names().await, vec!["s"]);
        assert_eq!(
            pipeline.run_outgoing(event()).await,
            RunOutcome::Completed { stage: "s".into() }
        );
    }
}
