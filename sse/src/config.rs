use std::time::Duration;

/// Tuning knobs for the push engine.
///
/// The engine never reads the environment itself; the process configuration
/// layer builds one of these and hands it to [`crate::Manager`].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Registrations beyond this many live connections are rejected.
    pub max_connections: usize,
    /// Heartbeat interval for connections that do not request their own.
    pub heartbeat_interval: Duration,
    /// Connections whose last successful heartbeat is older than this are evicted.
    pub connection_timeout: Duration,
    /// Lower bound for a client-requested heartbeat interval.
    pub min_heartbeat_interval: Duration,
    /// Upper bound for a client-requested heartbeat interval.
    pub max_heartbeat_interval: Duration,
    /// Deadline for a single frame write; expiry counts as a delivery failure.
    pub write_timeout: Duration,
    /// Frames buffered per connection before writes start waiting.
    pub connection_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            heartbeat_interval: Duration::from_millis(30_000),
            connection_timeout: Duration::from_millis(300_000),
            min_heartbeat_interval: Duration::from_millis(5_000),
            max_heartbeat_interval: Duration::from_millis(300_000),
            write_timeout: Duration::from_millis(5_000),
            connection_buffer_size: 64,
        }
    }
}

impl EngineConfig {
    /// Resolves a client-requested heartbeat interval, falling back to the
    /// engine's own interval and clamping into the configured range.
    pub fn clamp_heartbeat_interval(&self, requested_ms: Option<u64>) -> Duration {
        let requested = requested_ms
            .map(Duration::from_millis)
            .unwrap_or(self.heartbeat_interval);
        requested.clamp(
            self.min_heartbeat_interval,
            self.max_heartbeat_interval.max(self.min_heartbeat_interval),
        )
    }

    /// Period of the heartbeat monitor. Every connection's interval is at
    /// least the configured minimum, so ticking at that minimum is enough to
    /// serve each one on time.
    pub fn heartbeat_tick(&self) -> Duration {
        self.min_heartbeat_interval.max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.connection_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_clamp_heartbeat_interval() {
        let config = EngineConfig::default();
        assert_eq!(
            config.clamp_heartbeat_interval(Some(10)),
            Duration::from_millis(5_000)
        );
        assert_eq!(
            config.clamp_heartbeat_interval(Some(1_000_000)),
            Duration::from_millis(300_000)
        );
        assert_eq!(
            config.clamp_heartbeat_interval(Some(15_000)),
            Duration::from_millis(15_000)
        );
        assert_eq!(
            config.clamp_heartbeat_interval(None),
            config.heartbeat_interval
        );
    }

    #[test]
    fn test_heartbeat_tick_follows_the_minimum_interval() {
        let config = EngineConfig {
            min_heartbeat_interval: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(config.heartbeat_tick(), Duration::from_secs(2));

        let zero = EngineConfig {
            min_heartbeat_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(zero.heartbeat_tick(), Duration::from_millis(1));
    }
}
