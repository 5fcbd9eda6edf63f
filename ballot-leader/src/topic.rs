//! Per-topic election engine.
//!
//! Each engine drives one topic's election: acquire the cluster-wide named
//! lock to become leader, advertise leadership over the ordered topic while
//! holding it, track the remote leader otherwise, and resolve multi-leader
//! collisions revealed by the broadcast after a partition heals.
//!
//! The election is eventually consistent. While the cluster is partitioned
//! each side may believe in its own leader; once broadcasts flow again the
//! side that hears a conflicting advertisement steps down and runs for
//! re-election.

use crate::{EventDispatcher, LeaderConfig};
use async_trait::async_trait;
use ballot_core::{
    unix_millis, ClusterSubstrate, ControllerNode, EventCodec, Leadership, LeadershipEvent,
    LeadershipEventType, NamedLock, OrderedTopic, Result, SubscriptionId, TopicHandler,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Mutable election state, guarded by the engine monitor.
struct TopicState {
    /// The currently believed leader, if any
    leader: Option<ControllerNode>,
    /// When the last remote advertisement for the current leader arrived
    last_leadership_update_ms: u64,
}

/// Shared core of one engine, reachable from both worker tasks and the
/// incoming broadcast handler.
struct TopicInner {
    topic_name: String,
    local_node: ControllerNode,
    config: LeaderConfig,
    lock: Arc<dyn NamedLock>,
    topic: Arc<dyn OrderedTopic>,
    codec: Arc<dyn EventCodec>,
    dispatcher: Arc<EventDispatcher>,
    /// The engine monitor: every mutation of `leader` and
    /// `last_leadership_update_ms` happens under this lock, and local event
    /// posting is serialized with the mutation it reports.
    state: Mutex<TopicState>,
    /// Torn-free leader snapshot for lock-free `leader()` queries
    leader_tx: watch::Sender<Option<ControllerNode>>,
    /// Step-down signal aimed at the lock-holder task. Firing it is the
    /// only way leadership is voluntarily released.
    step_down_tx: mpsc::UnboundedSender<()>,
    is_shutdown: AtomicBool,
}

impl TopicInner {
    fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Acquire)
    }

    fn is_self(&self, node: &ControllerNode) -> bool {
        node.id == self.local_node.id
    }

    fn event(&self, event_type: LeadershipEventType, leader: ControllerNode) -> LeadershipEvent {
        LeadershipEvent::new(event_type, Leadership::new(self.topic_name.clone(), leader))
    }

    /// Broadcast an event to all peers. Failures are logged and absorbed;
    /// the next heartbeat or election cycle repairs the cluster view.
    async fn publish(&self, event: &LeadershipEvent) {
        let payload = match self.codec.encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %self.topic_name, error = %e, "failed to encode leadership event");
                return;
            }
        };
        if let Err(e) = self.topic.publish(payload).await {
            warn!(topic = %self.topic_name, error = %e, "failed to publish leadership event");
        }
    }

    /// One periodic pass: advertise ourselves while leading, or expire a
    /// remote leader that has gone silent too long.
    async fn periodic_tick(&self) {
        let mut state = self.state.lock().await;
        let Some(leader) = state.leader.clone() else {
            return;
        };

        if self.is_self(&leader) {
            // Heartbeat goes to the wire only; peers post it locally.
            let event = self.event(LeadershipEventType::LeaderReelected, self.local_node.clone());
            self.publish(&event).await;
        } else {
            let silence = unix_millis().saturating_sub(state.last_leadership_update_ms);
            if silence > self.config.remote_timeout.as_millis() as u64 {
                info!(topic = %self.topic_name, leader = %leader, "expiring stale remote leader");
                // A local belief, not a cluster fact: dispatch only to
                // local listeners.
                let event = self.event(LeadershipEventType::LeaderBooted, leader);
                state.leader = None;
                self.dispatcher.post(event).await;
                self.leader_tx.send_replace(None);
            }
        }
    }
}

/// Incoming broadcast handler registered with the ordered topic.
struct IncomingEvents {
    inner: Arc<TopicInner>,
}

#[async_trait]
impl TopicHandler for IncomingEvents {
    async fn on_message(&self, payload: Bytes) {
        let inner = &self.inner;
        let event = match inner.codec.decode(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(topic = %inner.topic_name, error = %e, "dropping undecodable leadership event");
                return;
            }
        };
        debug!(topic = %inner.topic_name, event = %event, "leadership event received");

        if event.subject.topic != inner.topic_name {
            return; // Not our topic: ignore
        }
        if inner.is_self(&event.subject.leader) {
            return; // Our own message: ignore
        }

        let mut state = inner.state.lock().await;
        if inner.is_shutdown() {
            return; // Delivery raced with teardown
        }
        match event.event_type {
            LeadershipEventType::LeaderElected | LeadershipEventType::LeaderReelected => {
                if state.leader.as_ref().map_or(false, |l| inner.is_self(l)) {
                    // Another leader while we hold the lock: a healed
                    // partition produced a collision. Step down and run for
                    // re-election; the lock-holder task publishes the boot
                    // and releases the lock.
                    info!(
                        topic = %inner.topic_name,
                        other = %event.subject.leader,
                        "conflicting leader detected, stepping down"
                    );
                    let _ = inner.step_down_tx.send(());
                    inner.dispatcher.post(event).await;
                } else {
                    let new_leader = event.subject.leader.clone();
                    state.leader = Some(new_leader.clone());
                    state.last_leadership_update_ms = unix_millis();
                    inner.dispatcher.post(event).await;
                    inner.leader_tx.send_replace(Some(new_leader));
                }
            }
            LeadershipEventType::LeaderBooted => {
                let was_current = state
                    .leader
                    .as_ref()
                    .map_or(false, |l| l.id == event.subject.leader.id);
                if was_current {
                    state.leader = None;
                }
                inner.dispatcher.post(event).await;
                if was_current {
                    inner.leader_tx.send_replace(None);
                }
            }
        }
    }
}

/// One topic's election engine.
///
/// Created by the service facade, which guarantees at most one engine per
/// topic name within a process. `start` launches the two worker tasks;
/// `stop` tears them down and joins them, so no publish or local dispatch
/// from this engine happens after `stop` returns.
pub(crate) struct TopicElection {
    inner: Arc<TopicInner>,
    shutdown_tx: watch::Sender<bool>,
    step_down_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    subscription: Mutex<Option<SubscriptionId>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TopicElection {
    pub(crate) fn new(
        topic_name: &str,
        local_node: ControllerNode,
        config: LeaderConfig,
        substrate: &dyn ClusterSubstrate,
        codec: Arc<dyn EventCodec>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let lock_name = format!("LeadershipService/{}/lock", topic_name);
        let topic_id = format!("LeadershipService/{}/topic", topic_name);

        let (leader_tx, _) = watch::channel(None);
        let (shutdown_tx, _) = watch::channel(false);
        let (step_down_tx, step_down_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(TopicInner {
            topic_name: topic_name.to_string(),
            local_node,
            config,
            lock: substrate.named_lock(&lock_name),
            topic: substrate.ordered_topic(&topic_id),
            codec,
            dispatcher,
            state: Mutex::new(TopicState {
                leader: None,
                last_leadership_update_ms: 0,
            }),
            leader_tx,
            step_down_tx,
            is_shutdown: AtomicBool::new(true),
        });

        Self {
            inner,
            shutdown_tx,
            step_down_rx: Mutex::new(Some(step_down_rx)),
            subscription: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The currently believed leader. Non-blocking best-effort snapshot.
    pub(crate) fn leader(&self) -> Option<ControllerNode> {
        self.inner.leader_tx.borrow().clone()
    }

    /// Starts leadership election for the topic.
    pub(crate) async fn start(&self) -> Result<()> {
        let step_down_rx = self
            .step_down_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ballot_core::BallotError::internal("election engine already started"))?;

        self.inner.is_shutdown.store(false, Ordering::Release);

        let handler = Arc::new(IncomingEvents {
            inner: self.inner.clone(),
        });
        let subscription = self.inner.topic.subscribe(handler).await?;
        *self.subscription.lock().await = Some(subscription);

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(run_lock_holder(
            self.inner.clone(),
            step_down_rx,
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(run_periodic(
            self.inner.clone(),
            self.shutdown_tx.subscribe(),
        )));

        debug!(topic = %self.inner.topic_name, "election engine started");
        Ok(())
    }

    /// Stops leadership election for the topic.
    ///
    /// Synchronous teardown: unsubscribes from the broadcast, signals both
    /// worker tasks and waits for them to finish. A leading engine publishes
    /// its final boot event and releases the lock before this returns.
    pub(crate) async fn stop(&self) {
        self.inner.is_shutdown.store(true, Ordering::Release);

        if let Some(id) = self.subscription.lock().await.take() {
            if let Err(e) = self.inner.topic.unsubscribe(id).await {
                warn!(topic = %self.inner.topic_name, error = %e, "failed to unsubscribe from leadership topic");
            }
        }

        let _ = self.shutdown_tx.send(true);

        for task in self.tasks.lock().await.drain(..) {
            if let Err(e) = task.await {
                warn!(topic = %self.inner.topic_name, error = %e, "election worker ended abnormally");
            }
        }

        debug!(topic = %self.inner.topic_name, "election engine stopped");
    }
}

/// Lock-holder task: run for election, announce on winning, hold until told
/// to step down, then release and run again.
async fn run_lock_holder(
    inner: Arc<TopicInner>,
    mut step_down: mpsc::UnboundedReceiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    while !inner.is_shutdown() {
        debug!(topic = %inner.topic_name, "running for election");

        tokio::select! {
            acquired = inner.lock.lock() => {
                if let Err(e) = acquired {
                    warn!(topic = %inner.topic_name, error = %e, "lock acquisition failed");
                    tokio::select! {
                        _ = tokio::time::sleep(inner.config.periodic_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                    continue;
                }
            }
            changed = shutdown.changed() => {
                // Abandons the lock wait; the loop head observes shutdown.
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        {
            let mut state = inner.state.lock().await;
            // A step-down aimed at an earlier term must not cancel this one.
            while step_down.try_recv().is_ok() {}

            info!(topic = %inner.topic_name, "elected leader");
            state.leader = Some(inner.local_node.clone());

            let event = inner.event(LeadershipEventType::LeaderElected, inner.local_node.clone());
            inner.dispatcher.post(event.clone()).await;
            inner.publish(&event).await;
            inner.leader_tx.send_replace(Some(inner.local_node.clone()));
        }

        // Hold the lock until asked to step down or shut down.
        tokio::select! {
            _ = step_down.recv() => {
                debug!(topic = %inner.topic_name, "step down requested");
            }
            _ = shutdown.changed() => {}
        }

        {
            let mut state = inner.state.lock().await;
            let was_leading = state.leader.as_ref().map_or(false, |l| inner.is_self(l));
            if was_leading {
                state.leader = None;
            }

            let event = inner.event(LeadershipEventType::LeaderBooted, inner.local_node.clone());
            inner.dispatcher.post(event.clone()).await;
            inner.publish(&event).await;

            if was_leading {
                // Clear the snapshot before the lock goes: a snapshot that
                // says we lead must never outlive our hold on the lock.
                inner.leader_tx.send_replace(None);
            }

            if let Err(e) = inner.lock.unlock().await {
                warn!(topic = %inner.topic_name, error = %e, "failed to release leadership lock");
            }
            debug!(topic = %inner.topic_name, "leadership released");
        }
    }
}

/// Periodic task: heartbeat while leading, expire a silent remote leader
/// while following.
async fn run_periodic(inner: Arc<TopicInner>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(inner.config.periodic_interval);
    // The immediate first tick is useless; skip it.
    ticker.tick().await;

    while !inner.is_shutdown() {
        tokio::select! {
            _ = ticker.tick() => {
                inner.periodic_tick().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
