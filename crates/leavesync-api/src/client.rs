// Tenant-scoped HTTP client
//
// Wraps `reqwest::Client` with the three request/response endpoints the
// notifier talks to: the long-poll changes feed, the outbound notify
// endpoint, and the server health probe. Every call carries its own
// deadline; the shared client timeout is only an upper bound.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::frames::{ChangesResponse, OutboundFrame};
use crate::transport::TransportConfig;

/// Outcome of one long-poll request that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    /// `200` with `has_changes: true`.
    Changed(ChangesResponse),
    /// `200` with `has_changes: false`.
    Unchanged,
    /// `422` — the server rejects steady polling from time to time.
    Unprocessable,
}

/// HTTP client for one tenant's change-notification endpoints.
pub struct TenantClient {
    http: reqwest::Client,
    base_url: Url,
    tenant_id: String,
}

impl TenantClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the server root (e.g. `https://sync.example.com`).
    pub fn new(
        base_url: Url,
        tenant_id: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            tenant_id: tenant_id.into(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, tenant_id: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            tenant_id: tenant_id.into(),
        }
    }

    /// The tenant this client is scoped to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Append `segments` to the base path, percent-encoding each one, so a
    /// tenant id can never add path levels, a query or a fragment.
    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `{base}/api/tenants/{tenant}/changes`
    pub fn changes_url(&self) -> Result<Url, Error> {
        self.url(&["api", "tenants", &self.tenant_id, "changes"])
    }

    /// `{base}/api/tenants/{tenant}/notify`
    pub fn notify_url(&self) -> Result<Url, Error> {
        self.url(&["api", "tenants", &self.tenant_id, "notify"])
    }

    /// `{base}/health`
    pub fn health_url(&self) -> Result<Url, Error> {
        self.url(&["health"])
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Ask the server what changed since `since` (ISO-8601).
    ///
    /// `wait_hint` tells the server how long it may hold the request open;
    /// `timeout` bounds the whole exchange on our side. A client-side
    /// timeout surfaces as [`Error::Timeout`].
    pub async fn poll_changes(
        &self,
        since: &str,
        wait_hint: Duration,
        timeout: Duration,
    ) -> Result<PollResponse, Error> {
        let url = self.changes_url()?;
        let wait = wait_hint.as_secs_f64().to_string();
        trace!(%url, since, wait = %wait, "GET changes");

        let resp = self
            .http
            .get(url)
            .query(&[("since", since), ("timeout", wait.as_str())])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        match resp.status() {
            StatusCode::OK => {
                let body = resp.text().await.map_err(|e| classify(e, timeout))?;
                let changes: ChangesResponse =
                    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                        message: e.to_string(),
                        body,
                    })?;
                if changes.has_changes {
                    Ok(PollResponse::Changed(changes))
                } else {
                    Ok(PollResponse::Unchanged)
                }
            }
            StatusCode::UNPROCESSABLE_ENTITY => Ok(PollResponse::Unprocessable),
            status => Err(unexpected(status, resp).await),
        }
    }

    /// Broadcast a locally-originated change to the other clients.
    ///
    /// Any status of 300 or above is reported as [`Error::UnexpectedStatus`].
    pub async fn notify(&self, frame: &OutboundFrame, timeout: Duration) -> Result<(), Error> {
        let url = self.notify_url()?;
        debug!(%url, change_type = %frame.change_type, "POST notify");

        let resp = self
            .http
            .post(url)
            .json(frame)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = resp.status();
        if status.as_u16() >= 300 {
            return Err(unexpected(status, resp).await);
        }
        Ok(())
    }

    /// Probe `GET /health`. Anything other than `200` is a failure.
    pub async fn health(&self, timeout: Duration) -> Result<(), Error> {
        let url = self.health_url()?;
        debug!(%url, "GET health");

        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        match resp.status() {
            StatusCode::OK => Ok(()),
            status => Err(unexpected(status, resp).await),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Turn reqwest timeouts into [`Error::Timeout`], keep everything else.
fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else {
        Error::Transport(err)
    }
}

async fn unexpected(status: StatusCode, resp: reqwest::Response) -> Error {
    let body = resp.text().await.unwrap_or_default();
    Error::UnexpectedStatus {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> TenantClient {
        TenantClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap(), "acme")
    }

    #[test]
    fn endpoint_urls() {
        let c = client("https://sync.example.com/");
        assert_eq!(
            c.changes_url().unwrap().as_str(),
            "https://sync.example.com/api/tenants/acme/changes"
        );
        assert_eq!(
            c.notify_url().unwrap().as_str(),
            "https://sync.example.com/api/tenants/acme/notify"
        );
        assert_eq!(c.health_url().unwrap().as_str(), "https://sync.example.com/health");
    }

    #[test]
    fn endpoint_urls_keep_base_path() {
        let c = client("http://localhost:8000/sync");
        assert_eq!(
            c.changes_url().unwrap().as_str(),
            "http://localhost:8000/sync/api/tenants/acme/changes"
        );
    }

    #[test]
    fn tenant_id_is_one_escaped_segment() {
        let c = TenantClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://sync.example.com").unwrap(),
            "acme?x=1#frag/../admin",
        );
        let url = c.changes_url().unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(
            url.path_segments().unwrap().collect::<Vec<_>>(),
            ["api", "tenants", "acme%3Fx=1%23frag%2F..%2Fadmin", "changes"]
        );
    }
}
