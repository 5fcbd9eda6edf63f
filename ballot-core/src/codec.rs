//! Pluggable serialization of leadership events for cluster broadcast.

use crate::{BallotError, LeadershipEvent, Result};
use bytes::Bytes;

/// Trait for turning leadership events into opaque broadcast payloads.
///
/// The only contract is round-trip equality: `decode(encode(e)) == e` for
/// every well-formed event. Deployments pick a codec; peers must agree.
pub trait EventCodec: Send + Sync {
    /// Serialize an event to bytes
    fn encode(&self, event: &LeadershipEvent) -> Result<Bytes>;

    /// Deserialize bytes back into an event
    fn decode(&self, payload: &[u8]) -> Result<LeadershipEvent>;
}

/// JSON codec, human-readable on the wire
#[derive(Debug, Default, Clone)]
pub struct JsonEventCodec;

impl EventCodec for JsonEventCodec {
    fn encode(&self, event: &LeadershipEvent) -> Result<Bytes> {
        serde_json::to_vec(event)
            .map(Bytes::from)
            .map_err(|e| BallotError::serialization(format!("JSON encoding failed: {}", e)))
    }

    fn decode(&self, payload: &[u8]) -> Result<LeadershipEvent> {
        serde_json::from_slice(payload)
            .map_err(|e| BallotError::serialization(format!("JSON decoding failed: {}", e)))
    }
}

/// Binary codec using bincode, compact on the wire
#[derive(Debug, Default, Clone)]
pub struct BinaryEventCodec;

impl EventCodec for BinaryEventCodec {
    fn encode(&self, event: &LeadershipEvent) -> Result<Bytes> {
        bincode::serialize(event)
            .map(Bytes::from)
            .map_err(|e| BallotError::serialization(format!("Binary encoding failed: {}", e)))
    }

    fn decode(&self, payload: &[u8]) -> Result<LeadershipEvent> {
        bincode::deserialize(payload)
            .map_err(|e| BallotError::serialization(format!("Binary decoding failed: {}", e)))
    }
}

/// Enum-based codec that avoids trait object indirection where a concrete
/// choice is configured.
#[derive(Debug, Clone)]
pub enum Codec {
    Json(JsonEventCodec),
    Binary(BinaryEventCodec),
}

impl Default for Codec {
    fn default() -> Self {
        Self::Binary(BinaryEventCodec)
    }
}

impl Codec {
    /// Create a new JSON codec
    pub fn json() -> Self {
        Self::Json(JsonEventCodec)
    }

    /// Create a new binary codec
    pub fn binary() -> Self {
        Self::Binary(BinaryEventCodec)
    }
}

impl EventCodec for Codec {
    fn encode(&self, event: &LeadershipEvent) -> Result<Bytes> {
        match self {
            Self::Json(c) => c.encode(event),
            Self::Binary(c) => c.encode(event),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<LeadershipEvent> {
        match self {
            Self::Json(c) => c.decode(payload),
            Self::Binary(c) => c.decode(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ControllerNode, Leadership, LeadershipEventType, NodeId};

    fn test_event() -> LeadershipEvent {
        let node = ControllerNode::new(NodeId::from(42), "127.0.0.1:6653".parse().unwrap());
        LeadershipEvent::new(
            LeadershipEventType::LeaderReelected,
            Leadership::new("sdn", node),
        )
    }

    #[test]
    fn json_round_trip() {
        let codec = Codec::json();
        let event = test_event();

        let payload = codec.encode(&event).unwrap();
        let decoded = codec.decode(&payload).unwrap();

        assert_eq!(event, decoded);
    }

    #[test]
    fn binary_round_trip() {
        let codec = Codec::binary();
        let event = test_event();

        let payload = codec.encode(&event).unwrap();
        let decoded = codec.decode(&payload).unwrap();

        assert_eq!(event, decoded);
    }

    #[test]
    fn binary_is_smaller_than_json() {
        let event = test_event();
        let json = Codec::json().encode(&event).unwrap();
        let binary = Codec::binary().encode(&event).unwrap();
        assert!(binary.len() < json.len());
    }

    #[test]
    fn decoding_garbage_fails_cleanly() {
        let codec = Codec::binary();
        let err = codec.decode(b"not a leadership event").unwrap_err();
        assert!(matches!(err, BallotError::Serialization { .. }));
    }

    #[test]
    fn codecs_are_not_interchangeable() {
        let event = test_event();
        let payload = Codec::json().encode(&event).unwrap();
        assert!(Codec::binary().decode(&payload).is_err());
    }
}
