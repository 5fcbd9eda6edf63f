//! In-memory clustering substrate.
//!
//! A single-process stand-in for the real substrate: named locks are
//! semaphores shared by every node handle, and each ordered topic is a
//! dispatcher task that delivers every published payload to every current
//! subscriber sequentially, so all subscribers observe one total order.
//! Publishers receive their own messages, as the real substrate may.

use async_trait::async_trait;
use ballot_core::{
    BallotError, ClusterMembership, ClusterSubstrate, ControllerNode, NamedLock, NodeId,
    OrderedTopic, Result, SubscriptionId, TopicHandler,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use uuid::Uuid;

/// Shared state of the simulated cluster.
struct ClusterShared {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
    topics: Mutex<HashMap<String, Arc<TopicBus>>>,
}

impl ClusterShared {
    async fn lock_cell(&self, name: &str) -> Arc<Semaphore> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    async fn topic_bus(&self, name: &str) -> Arc<TopicBus> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(TopicBus::new(name)))
            .clone()
    }
}

/// A simulated cluster. Clone handles out of it with [`node`](Self::node);
/// every handle shares the same locks and topics.
#[derive(Clone)]
pub struct InMemoryCluster {
    shared: Arc<ClusterShared>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ClusterShared {
                locks: Mutex::new(HashMap::new()),
                topics: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Join a node with a fresh identity to the cluster.
    pub fn node(&self, address: SocketAddr) -> InMemoryNode {
        self.node_with_id(NodeId::new(), address)
    }

    /// Join a node with a caller-chosen identity, useful for deterministic
    /// tests.
    pub fn node_with_id(&self, id: NodeId, address: SocketAddr) -> InMemoryNode {
        InMemoryNode {
            shared: self.shared.clone(),
            local: ControllerNode::new(id, address),
        }
    }
}

/// One node's view of the simulated cluster.
///
/// Implements both the substrate and the membership view, so it can be
/// handed straight to the leadership service.
#[derive(Clone)]
pub struct InMemoryNode {
    shared: Arc<ClusterShared>,
    local: ControllerNode,
}

impl ClusterSubstrate for InMemoryNode {
    fn named_lock(&self, name: &str) -> Arc<dyn NamedLock> {
        Arc::new(InMemoryLock {
            shared: self.shared.clone(),
            name: name.to_string(),
            held: Mutex::new(None),
        })
    }

    fn ordered_topic(&self, name: &str) -> Arc<dyn OrderedTopic> {
        Arc::new(InMemoryTopic {
            shared: self.shared.clone(),
            name: name.to_string(),
        })
    }
}

impl ClusterMembership for InMemoryNode {
    fn local_node(&self) -> ControllerNode {
        self.local.clone()
    }
}

/// Handle on one named lock. The permit is stored per handle, so the handle
/// that locked is the one that must unlock.
struct InMemoryLock {
    shared: Arc<ClusterShared>,
    name: String,
    held: Mutex<Option<OwnedSemaphorePermit>>,
}

#[async_trait]
impl NamedLock for InMemoryLock {
    async fn lock(&self) -> Result<()> {
        let cell = self.shared.lock_cell(&self.name).await;
        let permit = cell
            .acquire_owned()
            .await
            .map_err(|_| BallotError::substrate(format!("lock {} closed", self.name)))?;
        *self.held.lock().await = Some(permit);
        Ok(())
    }

    async fn unlock(&self) -> Result<()> {
        match self.held.lock().await.take() {
            Some(permit) => {
                drop(permit);
                Ok(())
            }
            None => Err(BallotError::substrate(format!(
                "unlock of {} without holding it",
                self.name
            ))),
        }
    }
}

/// Handle on one ordered topic.
struct InMemoryTopic {
    shared: Arc<ClusterShared>,
    name: String,
}

#[async_trait]
impl OrderedTopic for InMemoryTopic {
    async fn publish(&self, payload: Bytes) -> Result<()> {
        self.shared.topic_bus(&self.name).await.publish(payload)
    }

    async fn subscribe(&self, handler: Arc<dyn TopicHandler>) -> Result<SubscriptionId> {
        Ok(self.shared.topic_bus(&self.name).await.subscribe(handler).await)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.shared.topic_bus(&self.name).await.unsubscribe(id).await;
        Ok(())
    }
}

/// The globally ordered bus behind one topic name.
///
/// A single dispatcher task drains the publish queue and hands each payload
/// to every subscriber in turn before touching the next payload. That gives
/// all subscribers the same total order.
struct TopicBus {
    tx: mpsc::UnboundedSender<Bytes>,
    subscribers: Arc<Mutex<HashMap<SubscriptionId, Arc<dyn TopicHandler>>>>,
}

impl TopicBus {
    fn new(name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let subscribers: Arc<Mutex<HashMap<SubscriptionId, Arc<dyn TopicHandler>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let dispatch_to = subscribers.clone();
        let topic_name = name.to_string();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let handlers: Vec<Arc<dyn TopicHandler>> =
                    dispatch_to.lock().await.values().cloned().collect();
                for handler in handlers {
                    handler.on_message(payload.clone()).await;
                }
            }
            debug!(topic = %topic_name, "topic bus drained");
        });

        Self { tx, subscribers }
    }

    fn publish(&self, payload: Bytes) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| BallotError::substrate("topic bus stopped"))
    }

    async fn subscribe(&self, handler: Arc<dyn TopicHandler>) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.subscribers.lock().await.insert(id, handler);
        id
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().await.remove(&id);
    }
}
