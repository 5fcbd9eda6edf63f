//! # Core Types
//!
//! Fundamental types shared by every part of the leadership election service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a controller instance in the cluster.
///
/// Each controller participating in leadership elections carries a stable
/// identifier. It is the only attribute the election core compares: two
/// [`ControllerNode`] values describe the same instance exactly when their
/// ids are equal.
///
/// # Examples
///
/// ```rust
/// use ballot_core::NodeId;
///
/// let node_id = NodeId::new();
/// assert_ne!(node_id, NodeId::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Creates a new random node identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        // Convert u64 to UUID for testing purposes
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&id.to_be_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

/// A controller instance as seen by the election core.
///
/// Only the `id` participates in leader comparisons; the address travels
/// along for the benefit of listeners that want to reach the leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerNode {
    /// Stable identity of the instance
    pub id: NodeId,
    /// Management address of the instance, opaque to the election core
    pub address: SocketAddr,
}

impl ControllerNode {
    pub fn new(id: NodeId, address: SocketAddr) -> Self {
        Self { id, address }
    }
}

impl fmt::Display for ControllerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// A claim of leadership over one election topic.
///
/// The epoch is always zero today. The field is carried on the wire so a
/// future revision can thread a lock-provided fencing token through without
/// changing the format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leadership {
    /// Name of the election topic
    pub topic: String,
    /// The instance claiming (or losing) leadership
    pub leader: ControllerNode,
    /// Reserved for future fencing support, currently always 0
    pub epoch: u64,
}

impl Leadership {
    pub fn new(topic: impl Into<String>, leader: ControllerNode) -> Self {
        Self {
            topic: topic.into(),
            leader,
            epoch: 0,
        }
    }
}

impl fmt::Display for Leadership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} led by {}", self.topic, self.leader)
    }
}

/// The kind of leadership change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadershipEventType {
    /// An instance acquired the topic lock and became leader
    LeaderElected,
    /// The current leader advertised that it is still leading
    LeaderReelected,
    /// An instance lost, released, or was locally expired from leadership
    LeaderBooted,
}

impl fmt::Display for LeadershipEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadershipEventType::LeaderElected => write!(f, "LEADER_ELECTED"),
            LeadershipEventType::LeaderReelected => write!(f, "LEADER_REELECTED"),
            LeadershipEventType::LeaderBooted => write!(f, "LEADER_BOOTED"),
        }
    }
}

/// A leadership change notification.
///
/// Events are broadcast between controller instances over the ordered topic
/// and delivered to local subscribers through the listener registry. The
/// timestamp is wall-clock milliseconds at creation.
///
/// # Examples
///
/// ```rust
/// use ballot_core::{ControllerNode, Leadership, LeadershipEvent, LeadershipEventType, NodeId};
///
/// let node = ControllerNode::new(NodeId::new(), "127.0.0.1:6653".parse().unwrap());
/// let event = LeadershipEvent::new(
///     LeadershipEventType::LeaderElected,
///     Leadership::new("sdn", node),
/// );
/// assert_eq!(event.subject.epoch, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadershipEvent {
    /// What happened
    pub event_type: LeadershipEventType,
    /// The topic and instance the change is about
    pub subject: Leadership,
    /// Wall-clock milliseconds since the Unix epoch at creation
    pub timestamp: u64,
}

impl LeadershipEvent {
    pub fn new(event_type: LeadershipEventType, subject: Leadership) -> Self {
        Self {
            event_type,
            subject,
            timestamp: unix_millis(),
        }
    }
}

impl fmt::Display for LeadershipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.event_type, self.subject)
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(id: u64) -> ControllerNode {
        ControllerNode::new(NodeId::from(id), "127.0.0.1:6653".parse().unwrap())
    }

    #[test]
    fn node_id_from_u64_is_stable() {
        assert_eq!(NodeId::from(7), NodeId::from(7));
        assert_ne!(NodeId::from(7), NodeId::from(8));
    }

    #[test]
    fn leadership_epoch_is_zero() {
        let leadership = Leadership::new("sdn", test_node(1));
        assert_eq!(leadership.epoch, 0);
        assert_eq!(leadership.topic, "sdn");
    }

    #[test]
    fn node_equality_tracks_id() {
        let a = test_node(1);
        let b = ControllerNode::new(a.id, "10.0.0.1:6653".parse().unwrap());
        assert_eq!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn event_carries_subject_and_timestamp() {
        let before = unix_millis();
        let event = LeadershipEvent::new(
            LeadershipEventType::LeaderElected,
            Leadership::new("sdn", test_node(1)),
        );
        assert!(event.timestamp >= before);
        assert_eq!(event.event_type, LeadershipEventType::LeaderElected);
        assert_eq!(event.subject.leader.id, NodeId::from(1));
    }

    #[test]
    fn event_type_display() {
        assert_eq!(
            LeadershipEventType::LeaderReelected.to_string(),
            "LEADER_REELECTED"
        );
    }
}
