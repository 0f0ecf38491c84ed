// ── Shared notifier status ──
//
// One `watch` channel holds the current `NotifierStatus`. Every task
// mutates it through `StatusCell`; readers get cheap snapshots or a
// change stream.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{ActiveChannel, ConnectionState, NotifierStatus};

/// Single writer-side handle over the status channel.
pub(crate) struct StatusCell {
    tx: watch::Sender<NotifierStatus>,
}

impl StatusCell {
    pub(crate) fn new(poll_interval: Duration, max_errors: u64) -> Self {
        let (tx, _) = watch::channel(NotifierStatus::new(poll_interval, max_errors));
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> NotifierStatus {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<NotifierStatus> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ConnectionState {
        self.tx.borrow().state
    }

    /// Move to `state` unless already `Stopped`. Returns whether it changed.
    pub(crate) fn set_state(&self, state: ConnectionState) -> bool {
        self.tx.send_if_modified(|s| {
            if s.state == state || s.state == ConnectionState::Stopped {
                return false;
            }
            s.state = state;
            true
        })
    }

    pub(crate) fn set_active_channel(&self, channel: ActiveChannel) {
        self.tx.send_if_modified(|s| {
            if s.active_channel == channel {
                return false;
            }
            s.active_channel = channel;
            true
        });
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.tx.send_modify(|s| s.running = running);
    }

    pub(crate) fn set_persistent_connected(&self, connected: bool) {
        self.tx.send_modify(|s| s.persistent_connected = connected);
    }

    /// Mark the notifier stopped. Terminal; later `set_state` calls are ignored.
    pub(crate) fn mark_stopped(&self) {
        self.tx.send_modify(|s| {
            s.state = ConnectionState::Stopped;
            s.active_channel = ActiveChannel::None;
            s.running = false;
            s.persistent_connected = false;
            s.force_refresh_pending = false;
        });
    }

    pub(crate) fn record_poll(&self) {
        self.tx.send_modify(|s| s.last_poll = Some(Utc::now()));
    }

    pub(crate) fn record_successful_poll(&self) {
        self.tx.send_modify(|s| s.last_successful_poll = Some(Utc::now()));
    }

    pub(crate) fn record_event(&self, latency: Duration) {
        self.tx.send_modify(|s| {
            s.event_count += 1;
            s.last_event = Some(Utc::now());
            s.last_dispatch_latency = Some(latency);
        });
    }

    pub(crate) fn record_callback_failure(&self) {
        self.tx.send_modify(|s| s.callback_failures += 1);
    }

    /// Count one error. Returns the new count.
    pub(crate) fn record_error(&self) -> u64 {
        let mut count = 0;
        self.tx.send_modify(|s| {
            s.error_count += 1;
            count = s.error_count;
        });
        count
    }

    pub(crate) fn reset_errors(&self) {
        self.tx.send_if_modified(|s| {
            if s.error_count == 0 {
                return false;
            }
            s.error_count = 0;
            true
        });
    }

    pub(crate) fn request_force_refresh(&self) {
        self.tx.send_modify(|s| s.force_refresh_pending = true);
    }

    /// Clear the pending flag, returning whether it was set.
    pub(crate) fn take_force_refresh(&self) -> bool {
        let mut was_pending = false;
        self.tx.send_if_modified(|s| {
            was_pending = std::mem::take(&mut s.force_refresh_pending);
            was_pending
        });
        was_pending
    }
}

// ── StatusStream ─────────────────────────────────────────────────────

/// `Stream` of status snapshots, yielding the current one first and then
/// one item per change.
pub struct StatusStream {
    inner: WatchStream<NotifierStatus>,
}

impl StatusStream {
    pub(crate) fn new(receiver: watch::Receiver<NotifierStatus>) -> Self {
        Self {
            inner: WatchStream::new(receiver),
        }
    }
}

impl Stream for StatusStream {
    type Item = NotifierStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cell() -> StatusCell {
        StatusCell::new(Duration::from_secs(1), 10)
    }

    #[test]
    fn stopped_is_terminal() {
        let cell = cell();
        assert!(cell.set_state(ConnectionState::PollingActive));
        cell.mark_stopped();
        assert!(!cell.set_state(ConnectionState::PollingActive));
        assert_eq!(cell.state(), ConnectionState::Stopped);
        assert!(!cell.snapshot().running);
    }

    #[test]
    fn stopping_drops_a_pending_refresh() {
        let cell = cell();
        cell.request_force_refresh();
        cell.mark_stopped();
        assert!(!cell.snapshot().force_refresh_pending);
    }

    #[test]
    fn take_force_refresh_consumes_once() {
        let cell = cell();
        assert!(!cell.take_force_refresh());
        cell.request_force_refresh();
        assert!(cell.snapshot().force_refresh_pending);
        assert!(cell.take_force_refresh());
        assert!(!cell.take_force_refresh());
    }

    #[test]
    fn errors_count_and_reset() {
        let cell = cell();
        assert_eq!(cell.record_error(), 1);
        assert_eq!(cell.record_error(), 2);
        cell.reset_errors();
        assert_eq!(cell.snapshot().error_count, 0);
    }

    #[test]
    fn record_event_tracks_latency() {
        let cell = cell();
        cell.record_event(Duration::from_millis(3));
        let status = cell.snapshot();
        assert_eq!(status.event_count, 1);
        assert!(status.last_event.is_some());
        assert_eq!(status.last_dispatch_latency, Some(Duration::from_millis(3)));
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let cell = cell();
        let mut rx = cell.subscribe();
        cell.set_state(ConnectionState::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().state, ConnectionState::Connecting);
    }
}
