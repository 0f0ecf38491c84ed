// ── Notifier ──
//
// Transport manager for one tenant: owns the connection lifecycle,
// chooses the inbound channel, fails over from the push socket to
// polling, and exposes status and the outbound publish path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use leavesync_api::transport::TransportConfig;
use leavesync_api::{ChannelSignal, TenantClient, WebSocketChannel};

use crate::bus::ChangeEventBus;
use crate::cache::CacheInvalidator;
use crate::channel::persistent::{self, ChannelEnd};
use crate::channel::polling::{PollTiming, PollingChannel};
use crate::config::NotifierConfig;
use crate::error::CoreError;
use crate::handler::ChangeHandler;
use crate::model::{
    ActiveChannel, ChangeEvent, ChangeKind, ConnectionState, Details, EventSource, NotifierStatus,
    RefreshReason,
};
use crate::publisher::OutboundPublisher;
use crate::status::{StatusCell, StatusStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

/// Change-notification client for one tenant.
///
/// Cheaply cloneable via `Arc<NotifierInner>`. Create one per tenant in
/// the composition root; instances are fully independent.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    config: NotifierConfig,
    client: Arc<TenantClient>,
    status: Arc<StatusCell>,
    bus: Arc<ChangeEventBus>,
    publisher: OutboundPublisher,
    socket: Arc<ArcSwapOption<WebSocketChannel>>,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    polling_started: AtomicBool,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Notifier {
    /// Build a notifier. Does NOT connect; call [`start()`](Self::start).
    ///
    /// `cache` is invalidated before every handler invocation.
    pub fn new(
        config: NotifierConfig,
        cache: Option<Arc<dyn CacheInvalidator>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let transport = build_transport(&config);
        let client = Arc::new(TenantClient::new(
            config.server_url.clone(),
            config.tenant_id.clone(),
            &transport,
        )?);
        let status = Arc::new(StatusCell::new(config.poll_interval, config.max_errors));
        let bus = Arc::new(ChangeEventBus::new(cache, Arc::clone(&status)));
        let socket = Arc::new(ArcSwapOption::empty());
        let publisher = OutboundPublisher::new(
            Arc::clone(&client),
            Arc::clone(&bus),
            Arc::clone(&socket),
            config.publish_timeout,
        );

        Ok(Self {
            inner: Arc::new(NotifierInner {
                config,
                client,
                status,
                bus,
                publisher,
                socket,
                cancel: CancellationToken::new(),
                lifecycle: Mutex::new(Lifecycle::Idle),
                polling_started: AtomicBool::new(false),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.inner.config
    }

    /// The bus every event flows through.
    pub fn bus(&self) -> &Arc<ChangeEventBus> {
        &self.inner.bus
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Install `handler` and bring up an inbound channel.
    ///
    /// Tries the push socket first (bounded by `connect_wait`) and falls
    /// back to polling. Connection failures are never returned; only
    /// lifecycle misuse is.
    pub async fn start<H: ChangeHandler>(&self, handler: H) -> Result<(), CoreError> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Running => return Err(CoreError::AlreadyStarted),
            Lifecycle::Stopped => return Err(CoreError::Stopped),
            Lifecycle::Idle => {}
        }
        *lifecycle = Lifecycle::Running;

        let inner = &self.inner;
        inner.publisher.bind_runtime(Handle::current());
        inner.bus.set_handler(handler);
        inner.status.set_running(true);
        inner.status.set_state(ConnectionState::Connecting);
        info!(tenant_id = %inner.config.tenant_id, server = %inner.config.server_url, "starting notifier");

        if inner.config.websocket_enabled {
            match persistent::connect(&inner.config, inner.cancel.child_token()).await {
                Ok((channel, signals)) => {
                    self.adopt_socket(channel, signals).await;
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "persistent channel unavailable, falling back to polling"),
            }
        } else {
            debug!("persistent channel disabled");
        }

        self.start_polling().await;
        Ok(())
    }

    /// Stop every channel and background task. Idempotent; terminal.
    pub async fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if *lifecycle == Lifecycle::Stopped {
            debug!("notifier already stopped");
            return;
        }
        *lifecycle = Lifecycle::Stopped;

        let inner = &self.inner;
        let grace = inner.config.shutdown_grace;
        info!(tenant_id = %inner.config.tenant_id, "stopping notifier");
        inner.cancel.cancel();

        if let Some(socket) = inner.socket.swap(None) {
            socket.shutdown(grace).await;
        }

        // A supervisor finishing a failover may push one more handle.
        loop {
            let handles = std::mem::take(&mut *inner.task_handles.lock().await);
            if handles.is_empty() {
                break;
            }
            join_all_bounded(handles, grace).await;
        }

        inner.status.mark_stopped();
        info!("notifier stopped");
    }

    // ── Status ───────────────────────────────────────────────────────

    /// Point-in-time status snapshot.
    pub fn status(&self) -> NotifierStatus {
        self.inner.status.snapshot()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<NotifierStatus> {
        self.inner.status.subscribe()
    }

    /// Status changes as a `Stream`.
    pub fn status_stream(&self) -> StatusStream {
        StatusStream::new(self.inner.status.subscribe())
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Apply a local change and broadcast it best-effort.
    ///
    /// The handler has seen the event by the time this returns. Never
    /// fails and never blocks on the network.
    pub fn publish(&self, change_type: &str, details: Details) -> ChangeEvent {
        self.inner.publisher.publish(change_type, details)
    }

    /// Like [`publish()`](Self::publish), but waits for the network step.
    ///
    /// For one-shot callers that exit right after publishing.
    pub async fn publish_confirmed(
        &self,
        change_type: &str,
        details: Details,
    ) -> Result<ChangeEvent, CoreError> {
        self.inner
            .publisher
            .publish_confirmed(change_type, details)
            .await
    }

    /// Dispatch a local-only event. Nothing is sent to the server.
    ///
    /// `change_type` defaults to `manual_refresh`.
    pub fn send_immediate_refresh(&self, change_type: Option<&str>, details: Details) -> ChangeEvent {
        let event = ChangeEvent::new(
            self.inner.config.tenant_id.as_str(),
            change_type.unwrap_or(ChangeKind::MANUAL_REFRESH),
            details,
            EventSource::Client,
        );
        let _ = self.inner.bus.dispatch(&event);
        event
    }

    /// Request a `force_refresh` (reason `manual_force`).
    ///
    /// The polling loop picks it up on its next iteration; without a
    /// polling loop it is dispatched right away. Ignored once stopped.
    pub fn force_immediate_refresh(&self) {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            debug!("notifier stopped, forced refresh ignored");
            return;
        }
        inner.status.request_force_refresh();
        if !inner.polling_started.load(Ordering::Acquire) && inner.status.take_force_refresh() {
            let event = ChangeEvent::force_refresh(
                inner.config.tenant_id.as_str(),
                &RefreshReason::ManualForce,
            );
            let _ = inner.bus.dispatch(&event);
        }
    }

    // ── Health ───────────────────────────────────────────────────────

    /// Probe `GET /health`. Any failure means the server is offline.
    pub async fn check_health(config: &NotifierConfig) -> Result<(), CoreError> {
        let client = TenantClient::new(
            config.server_url.clone(),
            config.tenant_id.clone(),
            &build_transport(config),
        )?;
        client
            .health(config.health_timeout)
            .await
            .map_err(|e| CoreError::Offline {
                reason: e.to_string(),
            })
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn adopt_socket(&self, channel: WebSocketChannel, signals: mpsc::Receiver<ChannelSignal>) {
        let inner = &self.inner;
        let channel = Arc::new(channel);
        inner.socket.store(Some(Arc::clone(&channel)));
        inner.status.set_persistent_connected(true);
        inner.status.set_state(ConnectionState::PersistentConnected);
        inner.status.set_active_channel(ActiveChannel::Persistent);
        info!("persistent channel active");

        let handle = tokio::spawn(supervise_persistent(self.clone(), channel, signals));
        inner.task_handles.lock().await.push(handle);
    }

    /// Start the polling loop once. Later calls are no-ops.
    async fn start_polling(&self) {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() || inner.polling_started.swap(true, Ordering::AcqRel) {
            return;
        }

        inner.status.set_state(ConnectionState::PollingActive);
        inner.status.set_active_channel(ActiveChannel::Polling);

        let channel = PollingChannel::new(
            Arc::clone(&inner.client),
            Arc::clone(&inner.bus),
            Arc::clone(&inner.status),
            PollTiming {
                interval: inner.config.poll_interval,
                wait_hint: inner.config.poll_wait_hint,
                timeout: inner.config.poll_timeout,
            },
            inner.config.max_errors,
        );
        let handle = tokio::spawn(channel.run(inner.cancel.child_token()));
        inner.task_handles.lock().await.push(handle);
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Drain the push socket, then fail over to polling when it goes down.
async fn supervise_persistent(
    notifier: Notifier,
    channel: Arc<WebSocketChannel>,
    signals: mpsc::Receiver<ChannelSignal>,
) {
    let inner = &notifier.inner;
    let end = persistent::receive(
        signals,
        Arc::clone(&inner.bus),
        Arc::clone(&inner.status),
        inner.config.tenant_id.clone(),
        inner.cancel.child_token(),
    )
    .await;

    let state = match end {
        ChannelEnd::Cancelled => return,
        ChannelEnd::Closed { code, reason } => {
            warn!(?code, %reason, "persistent channel closed, failing over to polling");
            ConnectionState::PersistentClosed
        }
        ChannelEnd::Failed(reason) => {
            warn!(%reason, "persistent channel failed, failing over to polling");
            ConnectionState::PersistentError
        }
    };

    inner.status.record_error();
    inner.status.set_state(state);
    inner.status.set_persistent_connected(false);
    inner.socket.store(None);
    channel.shutdown(inner.config.shutdown_grace).await;

    notifier.start_polling().await;
}

async fn join_all_bounded(handles: Vec<JoinHandle<()>>, grace: Duration) {
    for mut handle in handles {
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!("background task did not exit in time, aborting");
            handle.abort();
        }
    }
}

/// Build a [`TransportConfig`] from the notifier configuration.
fn build_transport(config: &NotifierConfig) -> TransportConfig {
    TransportConfig {
        tls: config.tls_mode(),
        ..TransportConfig::default()
    }
}
