// ── Runtime notifier configuration ──
//
// These types describe *where* the notification server lives and how
// aggressively to talk to it. They never touch disk: the CLI (or any other
// composition root) builds a `NotifierConfig` and hands it in.

use std::time::Duration;

use leavesync_api::transport::TlsMode;
use url::Url;

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one tenant's change-notification client.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Server root URL (e.g., `https://sync.example.com`).
    pub server_url: Url,
    /// Tenant (scope) id; every subscription and query is scoped by it.
    pub tenant_id: String,
    /// TLS verification strategy for HTTP calls.
    pub tls: TlsVerification,
    /// Explicit push-socket URL. Derived from `server_url` when `None`.
    pub websocket_url: Option<Url>,
    /// Try the persistent channel before falling back to polling.
    pub websocket_enabled: bool,
    /// Bounded wait for the persistent channel handshake.
    pub connect_wait: Duration,
    /// Fixed sleep between two polls. Intentionally not adaptive.
    pub poll_interval: Duration,
    /// How long the server may hold a poll open (sent as `timeout=`).
    pub poll_wait_hint: Duration,
    /// Client-side deadline for a single poll.
    pub poll_timeout: Duration,
    /// Deadline for a fire-and-forget outbound notify.
    pub publish_timeout: Duration,
    /// Deadline for the health probe.
    pub health_timeout: Duration,
    /// Bounded join per background task on shutdown.
    pub shutdown_grace: Duration,
    /// Diagnostic error threshold. Reported, never enforced.
    pub max_errors: u64,
}

impl NotifierConfig {
    /// Build a config with the default timing for `server_url` / `tenant_id`.
    pub fn new(server_url: Url, tenant_id: impl Into<String>) -> Self {
        Self {
            server_url,
            tenant_id: tenant_id.into(),
            tls: TlsVerification::default(),
            websocket_url: None,
            websocket_enabled: true,
            connect_wait: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            poll_wait_hint: Duration::from_millis(500),
            poll_timeout: Duration::from_secs(2),
            publish_timeout: Duration::from_secs(3),
            health_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(1),
            max_errors: 10,
        }
    }

    /// Reject configurations the notifier cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tenant_id.trim().is_empty() {
            return Err(CoreError::Config {
                message: "tenant id must not be empty".into(),
            });
        }
        if !matches!(self.server_url.scheme(), "http" | "https") {
            return Err(CoreError::Config {
                message: format!(
                    "server URL must be http or https, got '{}'",
                    self.server_url.scheme()
                ),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::Config {
                message: "poll interval must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// The TLS mode shared by the HTTP client and the push socket.
    pub(crate) fn tls_mode(&self) -> TlsMode {
        match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }

    /// The push-socket URL: the explicit override, or
    /// `ws(s)://{host}/ws/tenants/{tenant}` derived from the server URL.
    pub fn resolved_websocket_url(&self) -> Result<Url, CoreError> {
        if let Some(ref url) = self.websocket_url {
            return Ok(url.clone());
        }

        let scheme = match self.server_url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        let invalid = || CoreError::Config {
            message: format!("cannot derive a WebSocket URL from {}", self.server_url),
        };

        let mut url = self.server_url.clone();
        url.set_scheme(scheme).map_err(|()| invalid())?;
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["ws", "tenants", self.tenant_id.as_str()]);
        Ok(url)
    }
}
