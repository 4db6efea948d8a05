//! Event documents relayed to iLert
//!
//! The same JSON document is stored in the queue and sent as the request
//! body, so the field names here are fixed by the iLert Zabbix events API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Version reported to iLert in every payload and by `--version`
pub const PLUGIN_VERSION: &str = "1.0";

/// Payload key carrying [`PLUGIN_VERSION`]
pub const PLUGIN_VERSION_KEY: &str = "PLUGIN_VERSION";

/// Caller-defined event body, passed through untouched apart from the
/// injected plugin version.
pub type Payload = Map<String, Value>;

/// What the event does to the iLert incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Open (trigger) an incident
    Alert,
    /// Acknowledge an open incident
    Ack,
    /// Resolve an incident
    Resolve,
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Alert => "alert",
            EventType::Ack => "ack",
            EventType::Resolve => "resolve",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert/ack/resolve notification for an iLert alert source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// API key of the iLert alert source
    pub api_key: String,
    /// Event type
    pub event_type: EventType,
    /// Zabbix message body
    pub payload: Payload,
}

impl Event {
    /// Build an event, stamping the payload with [`PLUGIN_VERSION`].
    pub fn new(api_key: impl Into<String>, event_type: EventType, mut payload: Payload) -> Self {
        payload.insert(
            PLUGIN_VERSION_KEY.to_string(),
            Value::String(PLUGIN_VERSION.to_string()),
        );
        Self {
            api_key: api_key.into(),
            event_type,
            payload,
        }
    }

    /// Serialize to the JSON document used on disk and over HTTP
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse a JSON document written by [`Event::to_json`]
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
