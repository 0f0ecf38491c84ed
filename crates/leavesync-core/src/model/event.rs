// ── Change event domain types ──

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use leavesync_api::frames::Details;
use leavesync_api::frames::OutboundFrame;

/// Which side created an event. Diagnostics only, never used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Client,
    Server,
}

impl EventSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ChangeKind ──────────────────────────────────────────────────────

/// The tag of a change event, parsed from its wire `change_type`.
///
/// Unknown tags land in [`ChangeKind::Other`] so newer servers can add
/// event types without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    VacationCreated,
    VacationUpdated,
    VacationDeleted,
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeHidden,
    /// Synthetic: re-read everything.
    ForceRefresh,
    ManualRefresh,
    TestSignal,
    Other(String),
}

impl ChangeKind {
    pub const FORCE_REFRESH: &'static str = "force_refresh";
    pub const MANUAL_REFRESH: &'static str = "manual_refresh";

    pub fn as_str(&self) -> &str {
        match self {
            Self::VacationCreated => "vacation_created",
            Self::VacationUpdated => "vacation_updated",
            Self::VacationDeleted => "vacation_deleted",
            Self::EmployeeCreated => "employee_created",
            Self::EmployeeUpdated => "employee_updated",
            Self::EmployeeHidden => "employee_hidden",
            Self::ForceRefresh => Self::FORCE_REFRESH,
            Self::ManualRefresh => Self::MANUAL_REFRESH,
            Self::TestSignal => "test_signal",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Whether consumers should re-fetch full state rather than apply a delta.
    pub fn requires_full_refresh(&self) -> bool {
        matches!(self, Self::ForceRefresh | Self::ManualRefresh | Self::Other(_))
    }
}

impl From<&str> for ChangeKind {
    fn from(s: &str) -> Self {
        match s {
            "vacation_created" => Self::VacationCreated,
            "vacation_updated" => Self::VacationUpdated,
            "vacation_deleted" => Self::VacationDeleted,
            "employee_created" => Self::EmployeeCreated,
            "employee_updated" => Self::EmployeeUpdated,
            "employee_hidden" => Self::EmployeeHidden,
            Self::FORCE_REFRESH => Self::ForceRefresh,
            Self::MANUAL_REFRESH => Self::ManualRefresh,
            "test_signal" => Self::TestSignal,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl FromStr for ChangeKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── RefreshReason ───────────────────────────────────────────────────

/// Why a `force_refresh` event was synthesized. Carried in `details.reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReason {
    /// The polling channel could not reach the server.
    ServerUnavailable,
    /// Someone called `force_immediate_refresh`.
    ManualForce,
    Other(String),
}

impl RefreshReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ServerUnavailable => "server_unavailable",
            Self::ManualForce => "manual_force",
            Self::Other(reason) => reason.as_str(),
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "server_unavailable" => Self::ServerUnavailable,
            "manual_force" => Self::ManualForce,
            other => Self::Other(other.to_owned()),
        }
    }
}

// ── ChangeEvent ─────────────────────────────────────────────────────

/// One change notification, inbound or outbound.
///
/// Immutable once built. Carries no identity beyond
/// (`scope_id`, `timestamp`, `change_type`); identical events arriving
/// twice are delivered twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    change_type: String,
    details: Details,
    timestamp: DateTime<Utc>,
    scope_id: String,
    source: EventSource,
}

impl ChangeEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        scope_id: impl Into<String>,
        change_type: impl Into<String>,
        details: Details,
        source: EventSource,
    ) -> Self {
        Self::at(scope_id, change_type, details, source, Utc::now())
    }

    /// Build an event with an explicit timestamp.
    pub fn at(
        scope_id: impl Into<String>,
        change_type: impl Into<String>,
        details: Details,
        source: EventSource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            change_type: change_type.into(),
            details,
            timestamp,
            scope_id: scope_id.into(),
            source,
        }
    }

    /// A synthetic local `force_refresh` event.
    pub fn force_refresh(scope_id: impl Into<String>, reason: &RefreshReason) -> Self {
        let mut details = Details::new();
        details.insert("reason".into(), Value::String(reason.as_str().to_owned()));
        Self::new(scope_id, ChangeKind::FORCE_REFRESH, details, EventSource::Client)
    }

    pub fn change_type(&self) -> &str {
        &self.change_type
    }

    pub fn kind(&self) -> ChangeKind {
        ChangeKind::from(self.change_type.as_str())
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn source(&self) -> EventSource {
        self.source
    }

    /// The reason of a `force_refresh` event, `None` for any other kind.
    pub fn refresh_reason(&self) -> Option<RefreshReason> {
        if self.kind() != ChangeKind::ForceRefresh {
            return None;
        }
        let reason = self.details.get("reason").and_then(Value::as_str)?;
        Some(RefreshReason::parse(reason))
    }

    /// The wire frame used for both the socket broadcast and `POST /notify`.
    pub fn to_outbound_frame(&self) -> OutboundFrame {
        OutboundFrame {
            change_type: self.change_type.clone(),
            details: self.details.clone(),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            tenant_id: self.scope_id.clone(),
            source: self.source.as_str().to_owned(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn known_tags_parse_and_round_trip() {
        for tag in [
            "vacation_created",
            "vacation_updated",
            "vacation_deleted",
            "employee_created",
            "employee_updated",
            "employee_hidden",
            "force_refresh",
            "manual_refresh",
            "test_signal",
        ] {
            let kind = ChangeKind::from(tag);
            assert!(!matches!(kind, ChangeKind::Other(_)), "{tag} should be known");
            assert_eq!(kind.as_str(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let kind = ChangeKind::from("department_renamed");
        assert_eq!(kind, ChangeKind::Other("department_renamed".into()));
        assert_eq!(kind.to_string(), "department_renamed");
        assert!(kind.requires_full_refresh());
    }

    #[test]
    fn force_refresh_carries_reason() {
        let event = ChangeEvent::force_refresh("acme", &RefreshReason::ServerUnavailable);
        assert_eq!(event.kind(), ChangeKind::ForceRefresh);
        assert_eq!(event.details()["reason"], "server_unavailable");
        assert_eq!(event.refresh_reason(), Some(RefreshReason::ServerUnavailable));
        assert_eq!(event.source(), EventSource::Client);
    }

    #[test]
    fn refresh_reason_only_for_force_refresh() {
        let mut details = Details::new();
        details.insert("reason".into(), json!("manual_force"));
        let event = ChangeEvent::new("acme", "vacation_created", details, EventSource::Server);
        assert_eq!(event.refresh_reason(), None);
    }

    #[test]
    fn outbound_frame_shape() {
        let mut details = Details::new();
        details.insert("vacation_id".into(), json!(5));
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let event = ChangeEvent::at("acme", "vacation_created", details, EventSource::Client, ts);

        let frame = event.to_outbound_frame();
        assert_eq!(frame.change_type, "vacation_created");
        assert_eq!(frame.tenant_id, "acme");
        assert_eq!(frame.source, "client");
        assert_eq!(frame.timestamp, "2026-03-01T09:30:00.000000Z");
        assert_eq!(frame.details["vacation_id"], 5);
    }
}
