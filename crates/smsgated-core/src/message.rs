//! Message types crossing the daemon's boundaries.
//!
//! [`SendRequest`] is the unit of outbound work: enqueued by producers,
//! drained by the daemon, handed to one worker process. [`QueueEnvelope`]
//! wraps queue traffic with a kind discriminator so send requests can share
//! the queue with other traffic. [`InboundSms`] is what an adapter reports
//! for received messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One queued outbound message request.
///
/// Ownership transfers from the queue to a dispatch task on drain; each
/// request is consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Destination address (phone number or adapter-specific identifier).
    pub to: String,

    /// Message text.
    pub text: String,

    /// Free-form metadata forwarded to the adapter (sender id, flags, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl SendRequest {
    /// Create a plain text send request.
    pub fn new(to: &str, text: &str) -> Self {
        Self {
            to: to.to_string(),
            text: text.to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Builder: attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Envelope for traffic on the per-endpoint queue.
///
/// The `kind` tag is the message-kind discriminator: the queue consumer keeps
/// only `send` envelopes and skips anything else sharing the queue name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueEnvelope {
    /// An outbound send request.
    Send(SendRequest),
}

impl QueueEnvelope {
    /// Serialize the envelope to its queue wire form (JSON).
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode an envelope from its queue wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// An inbound message reported by a device adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSms {
    /// Originating address the message was received from.
    pub origin: String,

    /// Message text.
    pub text: String,
}

impl InboundSms {
    /// Create an inbound message.
    pub fn new(origin: &str, text: &str) -> Self {
        Self {
            origin: origin.to_string(),
            text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let envelope = QueueEnvelope::Send(
            SendRequest::new("+15550100", "hello").with_metadata("sender_id", "ACME"),
        );
        let bytes = envelope.encode().unwrap();
        let decoded = QueueEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_envelope_kind_tag_on_wire() {
        let envelope = QueueEnvelope::Send(SendRequest::new("+1", "x"));
        let json = String::from_utf8(envelope.encode().unwrap()).unwrap();
        assert!(json.contains(r#""kind":"send""#), "wire form: {json}");
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let bytes = br#"{"kind":"probe","to":"+1"}"#;
        assert!(QueueEnvelope::decode(bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(QueueEnvelope::decode(b"\x00\x01\x02").is_err());
    }

    #[test]
    fn test_metadata_omitted_when_empty() {
        let envelope = QueueEnvelope::Send(SendRequest::new("+1", "x"));
        let json = String::from_utf8(envelope.encode().unwrap()).unwrap();
        assert!(!json.contains("metadata"));
    }
}
