//! Test support for the ballot leadership election service: an in-memory
//! clustering substrate and small helpers for observing elections.

pub mod cluster;

pub use cluster::{InMemoryCluster, InMemoryNode};

use ballot_core::{LeadershipEvent, LeadershipEventType};
use ballot_leader::LeadershipEventListener;
use std::sync::Mutex;

/// Listener that records every event it hears, for assertions in tests.
pub struct RecordingListener {
    events: Mutex<Vec<LeadershipEvent>>,
}

impl Default for RecordingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingListener {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Everything heard so far, in delivery order.
    pub fn events(&self) -> Vec<LeadershipEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, event_type: LeadershipEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl LeadershipEventListener for RecordingListener {
    fn handle_event(&self, event: &LeadershipEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
