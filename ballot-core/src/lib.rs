//! # Ballot Core
//!
//! Core building blocks for the ballot leadership election service:
//!
//! - **Types**: `NodeId`, `ControllerNode`, `Leadership`, `LeadershipEvent`
//! - **Codec**: pluggable serialization of events for cluster broadcast
//! - **Substrate traits**: the named lock and ordered topic the election
//!   engine consumes, plus cluster membership
//! - **Error handling**: the `BallotError` type and `Result` alias
//!
//! The election engine itself lives in the `ballot-leader` crate; an
//! in-memory substrate for tests lives in `ballot-testing`.

pub mod codec;
pub mod error;
pub mod substrate;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{BinaryEventCodec, Codec, EventCodec, JsonEventCodec};
pub use error::{BallotError, Result};
pub use substrate::{
    ClusterMembership, ClusterSubstrate, NamedLock, OrderedTopic, SubscriptionId, TopicHandler,
};
pub use types::{
    unix_millis, ControllerNode, Leadership, LeadershipEvent, LeadershipEventType, NodeId,
};
