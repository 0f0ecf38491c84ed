// ── Application change handlers ──
//
// What the bus calls after invalidating the cache. Closures are wrapped
// with `handler_fn`; UIs that want to drain events at their own pace use
// the bounded queue from `change_queue`.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::model::ChangeEvent;

/// Failure reported by a handler. Logged and counted by the bus, never
/// propagated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// Receives every dispatched change event.
///
/// Called on the dispatching task: keep it short and never block on I/O.
pub trait ChangeHandler: Send + Sync + 'static {
    fn handle(&self, event: &ChangeEvent) -> HandlerResult;
}

impl<H: ChangeHandler + ?Sized> ChangeHandler for Arc<H> {
    fn handle(&self, event: &ChangeEvent) -> HandlerResult {
        (**self).handle(event)
    }
}

impl<H: ChangeHandler + ?Sized> ChangeHandler for Box<H> {
    fn handle(&self, event: &ChangeEvent) -> HandlerResult {
        (**self).handle(event)
    }
}

// ── Closure handler ──────────────────────────────────────────────────

/// Adapter turning a closure into a [`ChangeHandler`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a handler.
///
/// ```rust,ignore
/// notifier.start(handler_fn(|event| {
///     println!("{}", event.change_type());
///     Ok(())
/// })).await?;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&ChangeEvent) -> HandlerResult + Send + Sync + 'static,
{
    FnHandler(f)
}

impl<F> ChangeHandler for FnHandler<F>
where
    F: Fn(&ChangeEvent) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, event: &ChangeEvent) -> HandlerResult {
        (self.0)(event)
    }
}

// ── Queue handler ────────────────────────────────────────────────────

/// Forwards events into a bounded channel without ever blocking.
///
/// A full queue drops the event and reports a handler failure.
pub struct QueueHandler {
    tx: mpsc::Sender<ChangeEvent>,
}

/// Build a queue handler and the receiver the application drains.
pub fn change_queue(capacity: usize) -> (QueueHandler, mpsc::Receiver<ChangeEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueHandler { tx }, rx)
}

impl ChangeHandler for QueueHandler {
    fn handle(&self, event: &ChangeEvent) -> HandlerResult {
        match self.tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(HandlerError::new("change queue full, event dropped")),
            Err(TrySendError::Closed(_)) => Err(HandlerError::new("change queue receiver dropped")),
        }
    }
}
