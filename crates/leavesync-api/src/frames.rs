// ── Wire frames ──
//
// JSON shapes exchanged with the server over both transports. The push
// socket and the HTTP endpoints share the same event shape so the core
// can treat them uniformly.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Opaque per-event payload. Its schema is owned by `change_type`.
pub type Details = Map<String, Value>;

/// Tag used when the server omits `change_type`.
pub const GENERAL_CHANGE: &str = "general";

fn general_change() -> String {
    GENERAL_CHANGE.to_owned()
}

/// Accept `null`, a missing field, or any JSON value for `details`.
///
/// Objects pass through. Non-object values are wrapped as `{"value": ...}`
/// so nothing the server sends is silently dropped.
fn details_or_empty<'de, D>(deserializer: D) -> Result<Details, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => Details::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Details::new();
            map.insert("value".into(), other);
            map
        }
    })
}

// ── Client → server ─────────────────────────────────────────────────

/// First frame sent after the socket opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub tenant_id: String,
}

impl SubscribeFrame {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            kind: "subscribe".into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// A locally-originated change broadcast to other clients.
///
/// Used verbatim both as a WebSocket text frame and as the JSON body of
/// `POST /api/tenants/{id}/notify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub change_type: String,
    pub details: Details,
    /// ISO-8601 creation time.
    pub timestamp: String,
    pub tenant_id: String,
    /// Always `"client"` for frames built by this crate's users.
    pub source: String,
}

// ── Server → client ─────────────────────────────────────────────────

/// A change pushed by the server over the socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerEventFrame {
    #[serde(default = "general_change")]
    pub change_type: String,
    #[serde(default, deserialize_with = "details_or_empty")]
    pub details: Details,
}

/// Body of a `200` answer from the changes endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub has_changes: bool,
    #[serde(default = "general_change")]
    pub change_type: String,
    #[serde(default, deserialize_with = "details_or_empty")]
    pub details: Details,
}
