//! Persistent push channel over a single WebSocket.
//!
//! Opens one socket to `ws(s)://host/ws/tenants/{id}`, subscribes, and
//! forwards everything it hears through an [`mpsc`] channel of
//! [`ChannelSignal`]s. There is deliberately no reconnect loop here: when
//! the socket fails or closes, a single terminal signal is emitted and the
//! owner decides what to fall back to.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use leavesync_api::transport::TlsMode;
//! use leavesync_api::websocket::{ChannelSignal, WebSocketChannel};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("wss://sync.example.com/ws/tenants/acme")?;
//! let (channel, mut signals) = WebSocketChannel::connect(
//!     &url,
//!     "acme",
//!     &TlsMode::System,
//!     Duration::from_secs(1),
//!     CancellationToken::new(),
//! )
//! .await?;
//!
//! while let Some(signal) = signals.recv().await {
//!     match signal {
//!         ChannelSignal::Event(frame) => println!("{}", frame.change_type),
//!         other => { println!("socket down: {other:?}"); break; }
//!     }
//! }
//!
//! channel.shutdown(Duration::from_secs(1)).await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::frames::{OutboundFrame, ServerEventFrame, SubscribeFrame};
use crate::transport::TlsMode;

// ── Channel capacities ───────────────────────────────────────────────

const SIGNAL_CHANNEL_CAPACITY: usize = 256;

/// Bound on the close handshake when the owner tears the socket down.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── ChannelSignal ────────────────────────────────────────────────────

/// Everything the socket reports to its owner.
///
/// `Closed` and `Failed` are terminal: at most one of them is emitted per
/// channel, and nothing follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// A parsed event frame pushed by the server.
    Event(ServerEventFrame),
    /// The server closed the socket (close frame or end of stream).
    Closed { code: Option<u16>, reason: String },
    /// A socket-level error after the connection was established.
    Failed(String),
}

// ── WebSocketChannel ─────────────────────────────────────────────────

/// Handle to one open push socket.
///
/// Reads and writes happen on two background tasks; the handle itself
/// never blocks on socket I/O.
pub struct WebSocketChannel {
    outbound_tx: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WebSocketChannel {
    /// Connect, send the subscribe frame, and spawn the reader/writer tasks.
    ///
    /// The whole handshake (TCP, TLS, upgrade, subscribe) must finish within
    /// `connect_wait`, otherwise [`Error::Timeout`] is returned. `tls`
    /// applies to `wss://` URLs only.
    pub async fn connect(
        url: &Url,
        tenant_id: &str,
        tls: &TlsMode,
        connect_wait: Duration,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<ChannelSignal>), Error> {
        let connector = tls.websocket_connector()?;
        let handshake = async {
            let stream = open_socket(url, connector).await?;
            let (mut write, read) = stream.split();

            let subscribe = serde_json::to_string(&SubscribeFrame::new(tenant_id)).map_err(|e| {
                Error::Deserialization {
                    message: e.to_string(),
                    body: String::new(),
                }
            })?;
            write
                .send(Message::Text(subscribe.into()))
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            tracing::debug!(tenant_id, "subscribe frame sent");

            Ok::<_, Error>((write, read))
        };

        let (write, read) = tokio::time::timeout(connect_wait, handshake)
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: u64::try_from(connect_wait.as_millis()).unwrap_or(u64::MAX),
            })??;

        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            read,
            signal_tx.clone(),
            Arc::clone(&open),
            cancel.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            write,
            outbound_rx,
            signal_tx,
            Arc::clone(&open),
            cancel.clone(),
        ));

        tracing::info!(url = %url, "WebSocket connected");

        Ok((
            Self {
                outbound_tx,
                open,
                cancel,
                tasks: Mutex::new(vec![reader, writer]),
            },
            signal_rx,
        ))
    }

    /// Whether the socket is currently open and healthy.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Serialize `frame` and queue it for the writer task.
    ///
    /// Never blocks. Fails with [`Error::NotConnected`] when the socket is
    /// not open, which callers treat as "not delivered".
    pub fn send(&self, frame: &OutboundFrame) -> Result<(), Error> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }

        let text = serde_json::to_string(frame).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;

        self.outbound_tx.send(text).map_err(|_| Error::NotConnected)
    }

    /// Close the socket and join both tasks, each with a bounded wait.
    ///
    /// Tasks still running after `grace` are aborted. Safe to call twice.
    pub async fn shutdown(&self, grace: Duration) {
        self.open.store(false, Ordering::Release);
        self.cancel.cancel();

        let mut tasks = self.tasks.lock().await;
        for mut handle in tasks.drain(..) {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                tracing::warn!("WebSocket task did not exit in time, aborting");
                handle.abort();
            }
        }
    }
}

// ── Connection setup ─────────────────────────────────────────────────

async fn open_socket(url: &Url, connector: Connector) -> Result<WsStream, Error> {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let (stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
        ClientRequestBuilder::new(uri),
        None,
        false,
        Some(connector),
    )
    .await
    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    Ok(stream)
}

// ── Background tasks ─────────────────────────────────────────────────

/// Emit the terminal signal exactly once, whichever task notices first.
async fn report_down(
    open: &AtomicBool,
    signal_tx: &mpsc::Sender<ChannelSignal>,
    signal: ChannelSignal,
) {
    if open.swap(false, Ordering::AcqRel) {
        let _ = signal_tx.send(signal).await;
    }
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    signal_tx: mpsc::Sender<ChannelSignal>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_event(&text) {
                            if signal_tx.send(ChannelSignal::Event(event)).await.is_err() {
                                // Owner dropped the receiver; nobody is listening.
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or((None, String::new()), |cf| {
                            (Some(u16::from(cf.code)), cf.reason.to_string())
                        });
                        tracing::info!(?code, %reason, "WebSocket close frame received");
                        report_down(&open, &signal_tx, ChannelSignal::Closed { code, reason }).await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read error");
                        report_down(&open, &signal_tx, ChannelSignal::Failed(e.to_string())).await;
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        report_down(
                            &open,
                            &signal_tx,
                            ChannelSignal::Closed { code: None, reason: "stream ended".into() },
                        )
                        .await;
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }

    tracing::debug!("WebSocket reader exiting");
}

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    signal_tx: mpsc::Sender<ChannelSignal>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let close = async {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                };
                let _ = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, close).await;
                break;
            }
            text = outbound_rx.recv() => {
                let Some(text) = text else { break };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    report_down(&open, &signal_tx, ChannelSignal::Failed(e.to_string())).await;
                    break;
                }
                tracing::trace!("outbound frame written");
            }
        }
    }

    tracing::debug!("WebSocket writer exiting");
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a server text frame. Malformed frames are logged and skipped.
fn parse_event(text: &str) -> Option<ServerEventFrame> {
    match serde_json::from_str::<ServerEventFrame>(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WebSocket frame");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
