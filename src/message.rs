use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SupabaseError;

pub const PHX_CLOSE: &str = "phx_close";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_JOIN: &str = "phx_join";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_LEAVE: &str = "phx_leave";
pub const HEARTBEAT_EVENT: &str = "heartbeat";
/// Topic that heartbeats are addressed to
pub const PHOENIX_TOPIC: &str = "phoenix";

/// Message payload: a JSON object
pub type Payload = Map<String, Value>;

/// Phoenix channel envelope exchanged over the realtime socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub event: String,
    #[serde(default, deserialize_with = "payload_or_empty")]
    pub payload: Payload,
    /// Correlation id assigned by the server; never generated locally
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub topic: String,
}

fn payload_or_empty<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    pub fn new(topic: &str, event: &str, payload: Payload) -> Self {
        Self {
            event: event.to_string(),
            payload,
            reference: None,
            topic: topic.to_string(),
        }
    }

    /// Join handshake for `topic`, asking the server to echo our own broadcasts
    pub fn join(topic: &str) -> Self {
        let payload = serde_json::json!({
            "config": {
                "broadcast": {
                    "self": true
                }
            }
        });
        Self::new(topic, PHX_JOIN, into_payload(payload))
    }

    /// Keepalive frame
    pub fn heartbeat() -> Self {
        let payload = serde_json::json!({ "msg": "heartbeat" });
        Self::new(PHOENIX_TOPIC, HEARTBEAT_EVENT, into_payload(payload))
    }

    /// Server acknowledgement, not an application event
    pub fn is_reply(&self) -> bool {
        self.event == PHX_REPLY
    }

    /// Serialize an outbound message into a text frame.
    pub fn encode(&self) -> Result<String, SupabaseError> {
        if self.event.is_empty() {
            return Err(SupabaseError::InvalidMessage(
                "event must not be empty".to_string(),
            ));
        }
        if self.topic.is_empty() {
            return Err(SupabaseError::InvalidMessage(
                "topic must not be empty".to_string(),
            ));
        }
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an inbound text frame.
    pub fn decode(frame: &str) -> Result<Self, SupabaseError> {
        Ok(serde_json::from_str(frame)?)
    }
}

fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
