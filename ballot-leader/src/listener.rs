//! Local delivery of leadership events.
//!
//! Listeners are plain callback objects registered with the service facade.
//! The registry fans each event out to every listener in registration order;
//! a panicking listener is logged and skipped so the remaining listeners
//! still hear the event.

use ballot_core::LeadershipEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

/// Receiver of leadership events on the local instance.
///
/// Delivery happens on the task that posted the event, while the posting
/// engine holds its monitor. Listeners must be non-blocking or accept that
/// they delay election processing.
pub trait LeadershipEventListener: Send + Sync {
    fn handle_event(&self, event: &LeadershipEvent);
}

/// Ordered set of listeners with idempotent registration.
///
/// Listener identity is `Arc` pointer identity: registering the same `Arc`
/// twice is a no-op, and removal only matches the exact `Arc` that was
/// registered.
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn LeadershipEventListener>>>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_listener(&self, listener: Arc<dyn LeadershipEventListener>) {
        let mut listeners = self.listeners.write().await;
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    pub async fn remove_listener(&self, listener: &Arc<dyn LeadershipEventListener>) {
        let mut listeners = self.listeners.write().await;
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Deliver an event to every current listener, sequentially.
    pub async fn process(&self, event: &LeadershipEvent) {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.handle_event(event))).is_err() {
                error!(event = %event, "leadership listener panicked, continuing with remaining listeners");
            }
        }
    }
}

/// In-process event dispatcher.
///
/// Election engines post through the dispatcher rather than straight into
/// the registry so the service can disconnect local delivery on
/// deactivation: once the sink is removed, posted events go nowhere.
pub struct EventDispatcher {
    sink: RwLock<Option<Arc<ListenerRegistry>>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(None),
        }
    }

    pub async fn install_sink(&self, registry: Arc<ListenerRegistry>) {
        *self.sink.write().await = Some(registry);
    }

    pub async fn remove_sink(&self) {
        *self.sink.write().await = None;
    }

    pub async fn post(&self, event: LeadershipEvent) {
        let sink = self.sink.read().await.clone();
        if let Some(registry) = sink {
            registry.process(&event).await;
        }
    }
}
