// ── Polling (long-poll HTTP) channel ──
//
// Fallback when the push socket is unavailable. One bounded request per
// iteration, a fixed sleep between iterations, and every failure is
// classified: timeouts are normal, 422 is benign, unreachable servers
// synthesize a forced refresh so consumers re-read state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use leavesync_api::{PollResponse, TenantClient};

use crate::bus::ChangeEventBus;
use crate::error::CoreError;
use crate::model::{ChangeEvent, EventSource, RefreshReason};
use crate::status::StatusCell;

/// Timing knobs for the polling loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PollTiming {
    pub interval: Duration,
    pub wait_hint: Duration,
    pub timeout: Duration,
}

pub(crate) struct PollingChannel {
    client: Arc<TenantClient>,
    bus: Arc<ChangeEventBus>,
    status: Arc<StatusCell>,
    timing: PollTiming,
    max_errors: u64,
    last_check: Option<DateTime<Utc>>,
}

impl PollingChannel {
    pub(crate) fn new(
        client: Arc<TenantClient>,
        bus: Arc<ChangeEventBus>,
        status: Arc<StatusCell>,
        timing: PollTiming,
        max_errors: u64,
    ) -> Self {
        Self {
            client,
            bus,
            status,
            timing,
            max_errors,
            last_check: None,
        }
    }

    /// Poll until cancelled. The first request goes out immediately.
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        info!(
            interval_ms = u64::try_from(self.timing.interval.as_millis()).unwrap_or(u64::MAX),
            "polling channel started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if self.status.take_force_refresh() {
                info!("dispatching requested forced refresh");
                self.dispatch(&ChangeEvent::force_refresh(
                    self.client.tenant_id(),
                    &RefreshReason::ManualForce,
                ));
            } else if !self.poll_once(&cancel).await {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.timing.interval) => {}
            }
        }

        debug!("polling channel stopped");
    }

    /// One request/response cycle. Returns `false` when cancelled mid-flight.
    async fn poll_once(&mut self, cancel: &CancellationToken) -> bool {
        let requested_at = Utc::now();
        let since = self
            .last_check
            .unwrap_or(requested_at)
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        self.status.record_poll();

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            result = self.client.poll_changes(&since, self.timing.wait_hint, self.timing.timeout) => result,
        };

        match result {
            Ok(PollResponse::Changed(changes)) => {
                self.mark_success(requested_at);
                self.status.reset_errors();
                debug!(change_type = %changes.change_type, "change reported by poll");
                self.dispatch(&ChangeEvent::new(
                    self.client.tenant_id(),
                    changes.change_type,
                    changes.details,
                    EventSource::Server,
                ));
            }
            Ok(PollResponse::Unchanged) => {
                self.mark_success(requested_at);
                trace!("poll: no changes");
            }
            Ok(PollResponse::Unprocessable) => self.handle_failure(&CoreError::PollUnprocessable),
            Err(e) => self.handle_failure(&CoreError::from(e)),
        }
        true
    }

    fn mark_success(&mut self, requested_at: DateTime<Utc>) {
        self.status.record_successful_poll();
        self.last_check = Some(requested_at);
    }

    fn handle_failure(&self, err: &CoreError) {
        if !err.is_counted() {
            trace!(error = %err, "poll timed out");
            return;
        }

        let count = self.status.record_error();
        match err {
            CoreError::PollUnprocessable => {
                debug!(error_count = count, "poll rejected with 422");
                if count > self.max_errors {
                    info!(
                        error_count = count,
                        max_errors = self.max_errors,
                        "poll rejections above threshold, continuing"
                    );
                }
            }
            e if e.triggers_forced_refresh() => {
                warn!(error = %e, error_count = count, "server unreachable, forcing local refresh");
                self.dispatch(&ChangeEvent::force_refresh(
                    self.client.tenant_id(),
                    &RefreshReason::ServerUnavailable,
                ));
            }
            e => warn!(error = %e, error_count = count, "poll failed"),
        }
    }

    fn dispatch(&self, event: &ChangeEvent) {
        let _ = self.bus.dispatch(event);
    }
}
