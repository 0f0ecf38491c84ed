// ── Outbound publisher ──
//
// Local-first: the event is applied through the bus before anything
// touches the network. Propagation is one best-effort attempt, over the
// open socket if there is one, otherwise a detached `POST /notify`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use leavesync_api::{TenantClient, WebSocketChannel};

use crate::bus::ChangeEventBus;
use crate::error::CoreError;
use crate::model::{ChangeEvent, Details, EventSource};

pub(crate) struct OutboundPublisher {
    client: Arc<TenantClient>,
    bus: Arc<ChangeEventBus>,
    socket: Arc<ArcSwapOption<WebSocketChannel>>,
    publish_timeout: Duration,
    runtime: OnceLock<Handle>,
}

impl OutboundPublisher {
    pub(crate) fn new(
        client: Arc<TenantClient>,
        bus: Arc<ChangeEventBus>,
        socket: Arc<ArcSwapOption<WebSocketChannel>>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            client,
            bus,
            socket,
            publish_timeout,
            runtime: OnceLock::new(),
        }
    }

    /// Remember the runtime so publishes from plain threads can still
    /// spawn the HTTP fallback.
    pub(crate) fn bind_runtime(&self, handle: Handle) {
        let _ = self.runtime.set(handle);
    }

    /// Apply locally, then propagate once without blocking the caller.
    pub(crate) fn publish(&self, change_type: &str, details: Details) -> ChangeEvent {
        let event = self.apply_locally(change_type, details);
        self.propagate(&event);
        event
    }

    /// Apply locally, then propagate and wait for the outcome.
    ///
    /// The local apply has happened even when this returns an error.
    pub(crate) async fn publish_confirmed(
        &self,
        change_type: &str,
        details: Details,
    ) -> Result<ChangeEvent, CoreError> {
        let event = self.apply_locally(change_type, details);
        let frame = event.to_outbound_frame();

        if let Some(socket) = self.socket.load_full() {
            if socket.send(&frame).is_ok() {
                return Ok(event);
            }
        }

        self.client
            .notify(&frame, self.publish_timeout)
            .await
            .map_err(|e| CoreError::PublishFailure {
                reason: e.to_string(),
            })?;
        Ok(event)
    }

    fn apply_locally(&self, change_type: &str, details: Details) -> ChangeEvent {
        let event = ChangeEvent::new(
            self.client.tenant_id(),
            change_type,
            details,
            EventSource::Client,
        );
        let _ = self.bus.dispatch(&event);
        event
    }

    fn propagate(&self, event: &ChangeEvent) {
        let frame = event.to_outbound_frame();

        if let Some(socket) = self.socket.load_full() {
            match socket.send(&frame) {
                Ok(()) => {
                    debug!(change_type = %frame.change_type, "published over WebSocket");
                    return;
                }
                Err(e) => debug!(error = %e, "WebSocket send failed, falling back to HTTP"),
            }
        }

        let Some(handle) = Handle::try_current()
            .ok()
            .or_else(|| self.runtime.get().cloned())
        else {
            warn!(
                change_type = %frame.change_type,
                "no async runtime available, skipping network publish"
            );
            return;
        };

        let client = Arc::clone(&self.client);
        let timeout = self.publish_timeout;
        handle.spawn(async move {
            match client.notify(&frame, timeout).await {
                Ok(()) => debug!(change_type = %frame.change_type, "published over HTTP"),
                Err(e) => warn!(change_type = %frame.change_type, error = %e, "HTTP publish failed"),
            }
        });
    }
}
