use std::time::Duration;

/// Timing configuration for per-topic elections.
///
/// The remote timeout must stay at least twice the periodic interval so a
/// follower tolerates one missed heartbeat before expiring the leader. The
/// defaults give a ratio of three.
#[derive(Debug, Clone)]
pub struct LeaderConfig {
    /// Interval between heartbeats while leading, and between staleness
    /// checks while following
    pub periodic_interval: Duration,
    /// Silence after which a remote leader is locally expired
    pub remote_timeout: Duration,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            periodic_interval: Duration::from_millis(5000),
            remote_timeout: Duration::from_millis(15000),
        }
    }
}

impl LeaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_periodic_interval(mut self, interval: Duration) -> Self {
        self.periodic_interval = interval;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_tolerate_two_missed_heartbeats() {
        let config = LeaderConfig::default();
        assert_eq!(config.periodic_interval, Duration::from_millis(5000));
        assert_eq!(config.remote_timeout, Duration::from_millis(15000));
        assert!(config.remote_timeout >= 2 * config.periodic_interval);
    }

    #[test]
    fn builders_override_defaults() {
        let config = LeaderConfig::new()
            .with_periodic_interval(Duration::from_millis(50))
            .with_remote_timeout(Duration::from_millis(150));
        assert_eq!(config.periodic_interval, Duration::from_millis(50));
        assert_eq!(config.remote_timeout, Duration::from_millis(150));
    }
}
