// ── Change event bus ──
//
// Every inbound and locally-published event passes through `dispatch`:
// cache invalidation, then the application handler, then status
// bookkeeping. Handler failures stop here.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use tracing::{trace, warn};

use crate::cache::CacheInvalidator;
use crate::error::CoreError;
use crate::handler::ChangeHandler;
use crate::model::ChangeEvent;
use crate::status::StatusCell;

/// Sized wrapper so a trait object fits in an `ArcSwapOption`.
struct HandlerSlot(Box<dyn ChangeHandler>);

/// Fan-in point for change events.
pub struct ChangeEventBus {
    invalidator: Option<Arc<dyn CacheInvalidator>>,
    handler: ArcSwapOption<HandlerSlot>,
    status: Arc<StatusCell>,
}

impl ChangeEventBus {
    pub(crate) fn new(
        invalidator: Option<Arc<dyn CacheInvalidator>>,
        status: Arc<StatusCell>,
    ) -> Self {
        Self {
            invalidator,
            handler: ArcSwapOption::empty(),
            status,
        }
    }

    /// Install (or replace) the application handler.
    pub fn set_handler<H: ChangeHandler>(&self, handler: H) {
        self.handler
            .store(Some(Arc::new(HandlerSlot(Box::new(handler)))));
    }

    pub fn clear_handler(&self) {
        self.handler.store(None);
    }

    pub fn has_handler(&self) -> bool {
        self.handler.load().is_some()
    }

    /// Deliver one event.
    ///
    /// Invalidation always happens strictly before the handler runs. The
    /// event is counted even when the handler fails; the failure is
    /// returned for callers that care and otherwise only logged.
    pub fn dispatch(&self, event: &ChangeEvent) -> Result<(), CoreError> {
        let started = Instant::now();

        if let Some(ref invalidator) = self.invalidator {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| invalidator.invalidate())) {
                warn!(
                    change_type = event.change_type(),
                    panic = %panic_message(payload.as_ref()),
                    "cache invalidation panicked"
                );
            }
        }

        let outcome = self
            .handler
            .load_full()
            .map_or(Ok(()), |slot| invoke(&slot, event));

        let latency = started.elapsed();
        self.status.record_event(latency);
        trace!(
            change_type = event.change_type(),
            source = %event.source(),
            latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX),
            "event dispatched"
        );

        if outcome.is_err() {
            self.status.record_callback_failure();
        }
        outcome
    }
}

fn invoke(slot: &HandlerSlot, event: &ChangeEvent) -> Result<(), CoreError> {
    let message = match catch_unwind(AssertUnwindSafe(|| slot.0.handle(event))) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("handler panicked: {}", panic_message(payload.as_ref())),
    };
    warn!(change_type = event.change_type(), error = %message, "change handler failed");
    Err(CoreError::CallbackFailed {
        change_type: event.change_type().to_owned(),
        message,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".into()
    }
}
