// ── Persistent (WebSocket) channel ──
//
// Connects the push socket and drains its signals into the bus until the
// socket fails, closes, or the notifier is cancelled. No retry here: the
// notifier decides what to fall back to.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use leavesync_api::{ChannelSignal, WebSocketChannel};

use crate::bus::ChangeEventBus;
use crate::config::NotifierConfig;
use crate::error::CoreError;
use crate::model::{ChangeEvent, EventSource};
use crate::status::StatusCell;

/// How a persistent channel's receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChannelEnd {
    Closed { code: Option<u16>, reason: String },
    Failed(String),
    Cancelled,
}

/// Open the socket within `config.connect_wait`.
pub(crate) async fn connect(
    config: &NotifierConfig,
    cancel: CancellationToken,
) -> Result<(WebSocketChannel, mpsc::Receiver<ChannelSignal>), CoreError> {
    let url = config.resolved_websocket_url()?;
    let tls = config.tls_mode();
    WebSocketChannel::connect(&url, &config.tenant_id, &tls, config.connect_wait, cancel)
        .await
        .map_err(|e| match e {
            leavesync_api::Error::Timeout { timeout_ms } => CoreError::ConnectTimeout { timeout_ms },
            other => CoreError::from(other),
        })
}

/// Forward socket events to the bus until the channel ends.
pub(crate) async fn receive(
    mut signals: mpsc::Receiver<ChannelSignal>,
    bus: Arc<ChangeEventBus>,
    status: Arc<StatusCell>,
    scope_id: String,
    cancel: CancellationToken,
) -> ChannelEnd {
    loop {
        let signal = tokio::select! {
            biased;
            () = cancel.cancelled() => return ChannelEnd::Cancelled,
            signal = signals.recv() => signal,
        };

        match signal {
            Some(ChannelSignal::Event(frame)) => {
                status.reset_errors();
                debug!(change_type = %frame.change_type, "event received over WebSocket");
                let event = ChangeEvent::new(
                    scope_id.as_str(),
                    frame.change_type,
                    frame.details,
                    EventSource::Server,
                );
                let _ = bus.dispatch(&event);
            }
            Some(ChannelSignal::Closed { code, reason }) => {
                info!(?code, %reason, "WebSocket closed by server");
                return ChannelEnd::Closed { code, reason };
            }
            Some(ChannelSignal::Failed(reason)) => return ChannelEnd::Failed(reason),
            None => {
                return ChannelEnd::Closed {
                    code: None,
                    reason: "signal channel closed".into(),
                };
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use leavesync_api::ServerEventFrame;
    use serde_json::json;

    use super::*;
    use crate::handler::change_queue;
    use crate::model::Details;

    fn frame(tag: &str) -> ServerEventFrame {
        let mut details = Details::new();
        details.insert("id".into(), json!(7));
        ServerEventFrame {
            change_type: tag.into(),
            details,
        }
    }

    #[tokio::test]
    async fn events_are_dispatched_until_close() {
        let status = Arc::new(StatusCell::new(Duration::from_secs(1), 10));
        status.record_error();
        let bus = Arc::new(ChangeEventBus::new(None, Arc::clone(&status)));
        let (handler, mut events) = change_queue(8);
        bus.set_handler(handler);

        let (tx, rx) = mpsc::channel(8);
        tx.send(ChannelSignal::Event(frame("vacation_created"))).await.unwrap();
        tx.send(ChannelSignal::Closed {
            code: Some(1001),
            reason: "going away".into(),
        })
        .await
        .unwrap();

        let end = receive(rx, bus, Arc::clone(&status), "acme".into(), CancellationToken::new()).await;
        assert_eq!(
            end,
            ChannelEnd::Closed {
                code: Some(1001),
                reason: "going away".into()
            }
        );

        let event = events.recv().await.unwrap();
        assert_eq!(event.change_type(), "vacation_created");
        assert_eq!(event.source(), EventSource::Server);
        assert_eq!(event.scope_id(), "acme");
        assert_eq!(event.details()["id"], 7);
        assert_eq!(status.snapshot().error_count, 0);
    }

    #[tokio::test]
    async fn failure_ends_the_loop() {
        let status = Arc::new(StatusCell::new(Duration::from_secs(1), 10));
        let bus = Arc::new(ChangeEventBus::new(None, Arc::clone(&status)));
        let (tx, rx) = mpsc::channel(1);
        tx.send(ChannelSignal::Failed("reset by peer".into())).await.unwrap();

        let end = receive(rx, bus, status, "acme".into(), CancellationToken::new()).await;
        assert_eq!(end, ChannelEnd::Failed("reset by peer".into()));
    }

    #[tokio::test]
    async fn silent_server_is_a_connect_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let mut config = NotifierConfig::new(url::Url::parse("http://127.0.0.1:9").unwrap(), "acme");
        config.websocket_url =
            Some(url::Url::parse(&format!("ws://{addr}/ws/tenants/acme")).unwrap());
        config.connect_wait = Duration::from_millis(200);

        let result = connect(&config, CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(CoreError::ConnectTimeout { timeout_ms: 200 })
        ));
        accepted.abort();
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let status = Arc::new(StatusCell::new(Duration::from_secs(1), 10));
        let bus = Arc::new(ChangeEventBus::new(None, Arc::clone(&status)));
        let (_tx, rx) = mpsc::channel::<ChannelSignal>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let end = receive(rx, bus, status, "acme".into(), cancel).await;
        assert_eq!(end, ChannelEnd::Cancelled);
    }
}
