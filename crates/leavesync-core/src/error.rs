// ── Core error types ──
//
// The notifier's failure taxonomy. Wire-level failures from
// `leavesync-api` are classified into these variants by the `From` impl;
// most of them are recovered inside the notifier (failover, benign poll
// outcomes) and only ever show up in logs and status counters.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Persistent channel ───────────────────────────────────────────
    #[error("Persistent channel did not connect within {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    #[error("Persistent channel error: {reason}")]
    ChannelError { reason: String },

    // ── Polling channel ──────────────────────────────────────────────
    #[error("Poll timed out after {timeout_ms}ms")]
    PollTimeout { timeout_ms: u64 },

    #[error("Server answered the poll with 422 Unprocessable Entity")]
    PollUnprocessable,

    #[error("Notification server unreachable at {url}: {reason}")]
    PollUnreachable { url: String, reason: String },

    // ── Outbound ─────────────────────────────────────────────────────
    #[error("Outbound publish failed: {reason}")]
    PublishFailure { reason: String },

    // ── Dispatch ─────────────────────────────────────────────────────
    #[error("Change handler failed for '{change_type}': {message}")]
    CallbackFailed {
        change_type: String,
        message: String,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Notification server is offline: {reason}")]
    Offline { reason: String },

    #[error("Notifier is already running")]
    AlreadyStarted,

    #[error("Notifier has been stopped")]
    Stopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this failure counts as a real error in the status counters.
    ///
    /// Poll timeouts are the normal long-poll outcome and never count.
    pub fn is_counted(&self) -> bool {
        !matches!(self, Self::PollTimeout { .. })
    }

    /// Whether the notifier should synthesize a local forced refresh so the
    /// UI does not go silently stale.
    pub fn triggers_forced_refresh(&self) -> bool {
        matches!(self, Self::PollUnreachable { .. })
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<leavesync_api::Error> for CoreError {
    fn from(err: leavesync_api::Error) -> Self {
        match err {
            leavesync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::PollTimeout { timeout_ms: 0 }
                } else if e.is_connect() {
                    CoreError::PollUnreachable {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::ChannelError {
                        reason: e.to_string(),
                    }
                }
            }
            leavesync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            leavesync_api::Error::Timeout { timeout_ms } => CoreError::PollTimeout { timeout_ms },
            leavesync_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            leavesync_api::Error::UnexpectedStatus { status: 422, .. } => {
                CoreError::PollUnprocessable
            }
            leavesync_api::Error::UnexpectedStatus { status, body } => CoreError::ChannelError {
                reason: format!("unexpected HTTP status {status}: {body}"),
            },
            leavesync_api::Error::WebSocketConnect(reason) => CoreError::ChannelError {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            leavesync_api::Error::WebSocketClosed { code, reason } => CoreError::ChannelError {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            leavesync_api::Error::NotConnected => CoreError::PublishFailure {
                reason: "WebSocket is not connected".into(),
            },
            leavesync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
