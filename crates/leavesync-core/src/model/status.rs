// ── Notifier status types ──

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the notifier's connection.
///
/// `disconnected → connecting → persistent_connected | polling_active`,
/// `persistent_connected → persistent_error | persistent_closed → polling_active`,
/// and any state `→ stopped`. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    PersistentConnected,
    PersistentError,
    PersistentClosed,
    PollingActive,
    Stopped,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::PersistentConnected => "persistent_connected",
            Self::PersistentError => "persistent_error",
            Self::PersistentClosed => "persistent_closed",
            Self::PollingActive => "polling_active",
            Self::Stopped => "stopped",
        }
    }

    /// Degraded: the push socket failed and nothing has replaced it yet.
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::PersistentError | Self::PersistentClosed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which inbound channel currently delivers events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveChannel {
    #[default]
    None,
    Persistent,
    Polling,
}

impl ActiveChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Persistent => "persistent",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for ActiveChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of the notifier. Read-only to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierStatus {
    pub state: ConnectionState,
    pub active_channel: ActiveChannel,
    pub running: bool,
    /// Socket currently open.
    pub persistent_connected: bool,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
    pub event_count: u64,
    pub error_count: u64,
    pub max_errors: u64,
    pub callback_failures: u64,
    pub poll_interval: Duration,
    pub force_refresh_pending: bool,
    pub last_dispatch_latency: Option<Duration>,
}

impl NotifierStatus {
    pub fn new(poll_interval: Duration, max_errors: u64) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            active_channel: ActiveChannel::None,
            running: false,
            persistent_connected: false,
            last_poll: None,
            last_successful_poll: None,
            last_event: None,
            event_count: 0,
            error_count: 0,
            max_errors,
            callback_failures: 0,
            poll_interval,
            force_refresh_pending: false,
            last_dispatch_latency: None,
        }
    }

    /// Diagnostic only: the notifier keeps running past the threshold.
    pub fn error_threshold_exceeded(&self) -> bool {
        self.error_count >= self.max_errors
    }
}
