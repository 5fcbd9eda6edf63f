//! Service facade over the per-topic election engines.

use crate::{EventDispatcher, LeaderConfig, LeadershipEventListener, ListenerRegistry, TopicElection};
use ballot_core::{
    BallotError, ClusterMembership, ClusterSubstrate, ControllerNode, EventCodec, Leadership,
    Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Distributed leadership election service.
///
/// Applications register interest in leading a named topic with
/// [`run_for_leadership`](Self::run_for_leadership); the service coordinates
/// with peer controller instances through the clustering substrate so that
/// at most one instance is recognized as leader per topic in the steady
/// state, and delivers [`LeadershipEvent`](ballot_core::LeadershipEvent)s to
/// registered listeners as leadership changes.
///
/// Leadership is eventually consistent: during a substrate partition both
/// sides may transiently report a leader; the election engines reconcile
/// once the partition heals.
pub struct LeadershipService {
    local_node: ControllerNode,
    substrate: Arc<dyn ClusterSubstrate>,
    codec: Arc<dyn EventCodec>,
    config: LeaderConfig,
    registry: Arc<ListenerRegistry>,
    dispatcher: Arc<EventDispatcher>,
    topics: RwLock<HashMap<String, Arc<TopicElection>>>,
}

impl LeadershipService {
    /// Create and activate the service.
    ///
    /// Captures the local node identity from the membership view and
    /// connects the listener registry to the event dispatcher.
    pub async fn new(
        membership: Arc<dyn ClusterMembership>,
        substrate: Arc<dyn ClusterSubstrate>,
        codec: Arc<dyn EventCodec>,
        config: LeaderConfig,
    ) -> Self {
        let local_node = membership.local_node();
        let registry = Arc::new(ListenerRegistry::new());
        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher.install_sink(registry.clone()).await;

        info!(node = %local_node, "leadership service started");

        Self {
            local_node,
            substrate,
            codec,
            config,
            registry,
            dispatcher,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// The identity this service elects with.
    pub fn local_node(&self) -> &ControllerNode {
        &self.local_node
    }

    /// The currently believed leader for `path`, or `None` when the topic
    /// is unknown or leaderless. A best-effort snapshot that never waits on
    /// election progress.
    pub async fn get_leader(&self, path: &str) -> Option<ControllerNode> {
        let topics = self.topics.read().await;
        topics.get(path).and_then(|engine| engine.leader())
    }

    /// Join the election for `path`.
    ///
    /// The first call creates and starts an election engine for the topic;
    /// repeated calls are no-ops. Election proceeds asynchronously; the
    /// caller learns the outcome through listeners or [`get_leader`](Self::get_leader).
    pub async fn run_for_leadership(&self, path: &str) -> Result<()> {
        Self::check_topic_name(path)?;

        let engine = {
            let mut topics = self.topics.write().await;
            if topics.contains_key(path) {
                return Ok(());
            }
            let engine = Arc::new(TopicElection::new(
                path,
                self.local_node.clone(),
                self.config.clone(),
                self.substrate.as_ref(),
                self.codec.clone(),
                self.dispatcher.clone(),
            ));
            topics.insert(path.to_string(), engine.clone());
            engine
        };

        if let Err(e) = engine.start().await {
            self.topics.write().await.remove(path);
            return Err(e);
        }
        Ok(())
    }

    /// Leave the election for `path`, releasing leadership if held.
    ///
    /// Synchronous teardown of local participation; a no-op for unknown
    /// topics.
    pub async fn withdraw(&self, path: &str) -> Result<()> {
        Self::check_topic_name(path)?;

        let engine = self.topics.write().await.remove(path);
        if let Some(engine) = engine {
            engine.stop().await;
        }
        Ok(())
    }

    /// A cluster-wide view of every topic's leadership is not tracked by
    /// this service; the call always fails.
    pub fn leader_board(&self) -> Result<HashMap<String, Leadership>> {
        Err(BallotError::unsupported(
            "a cluster-wide leader board is not tracked by this service",
        ))
    }

    pub async fn add_listener(&self, listener: Arc<dyn LeadershipEventListener>) {
        self.registry.add_listener(listener).await;
    }

    pub async fn remove_listener(&self, listener: &Arc<dyn LeadershipEventListener>) {
        self.registry.remove_listener(listener).await;
    }

    /// Deactivate the service: disconnect local event delivery, stop every
    /// election engine and drop all topics.
    pub async fn shutdown(&self) {
        self.dispatcher.remove_sink().await;

        let engines: Vec<Arc<TopicElection>> = {
            let mut topics = self.topics.write().await;
            topics.drain().map(|(_, engine)| engine).collect()
        };
        for engine in engines {
            engine.stop().await;
        }

        info!(node = %self.local_node, "leadership service stopped");
    }

    fn check_topic_name(path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(BallotError::invalid_argument(
                "topic name must not be empty",
            ));
        }
        Ok(())
    }
}
