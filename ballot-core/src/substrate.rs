//! Interfaces onto the clustering substrate.
//!
//! The election core consumes two primitives from an external substrate: a
//! strongly consistent named lock and a totally ordered broadcast topic.
//! Both are addressed by string names so independent elections never collide.

use crate::{ControllerNode, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a topic subscription
pub type SubscriptionId = Uuid;

/// A cluster-wide mutual exclusion primitive.
///
/// At most one holder exists globally under non-partitioned operation.
/// During a partition each side may independently grant the lock; the
/// election engine reconciles that once the partition heals.
#[async_trait]
pub trait NamedLock: Send + Sync {
    /// Block until the lock is held.
    ///
    /// Must be cancel safe: dropping the returned future abandons the wait
    /// without acquiring. Cancellation is the caller's way of giving up on
    /// the lock, not an error.
    async fn lock(&self) -> Result<()>;

    /// Release the lock previously acquired through this handle.
    async fn unlock(&self) -> Result<()>;
}

/// Receiver side of an ordered topic subscription.
///
/// The substrate invokes `on_message` for every broadcast payload, in the
/// single total order all subscribers observe. Invocations on one
/// subscription are serialized.
#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn on_message(&self, payload: Bytes);
}

/// A best-effort, totally ordered broadcast topic.
///
/// Delivery is asynchronous and includes the publisher's own messages;
/// subscribers that do not want them must filter.
#[async_trait]
pub trait OrderedTopic: Send + Sync {
    async fn publish(&self, payload: Bytes) -> Result<()>;

    async fn subscribe(&self, handler: Arc<dyn TopicHandler>) -> Result<SubscriptionId>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}

/// Factory for the two substrate primitives, addressed by name.
///
/// Handles are lazy: creating one performs no I/O until it is first used.
pub trait ClusterSubstrate: Send + Sync {
    fn named_lock(&self, name: &str) -> Arc<dyn NamedLock>;

    fn ordered_topic(&self, name: &str) -> Arc<dyn OrderedTopic>;
}

/// Cluster membership as far as the election core needs it: the identity of
/// the instance it is running on.
pub trait ClusterMembership: Send + Sync {
    fn local_node(&self) -> ControllerNode;
}
