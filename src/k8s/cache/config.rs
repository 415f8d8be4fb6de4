/**
 * Configuration constants for the watched resource supervisor
 */
use super::change::ChangeDetection;
use std::time::Duration;
use tracing::warn;

/// Retry interval in milliseconds while the collection is known to have members
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1_000;

/// Retry interval in milliseconds after the probe found the collection empty
pub const DEFAULT_EMPTY_RETRY_INTERVAL_MS: u64 = 10_000;

/// Result size limit of the existence probe
pub const PROBE_LIMIT: u32 = 1;

/// Channel buffer size for each change subscriber
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Channel buffer size for the diagnostic broadcast
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 32;

pub const ENV_RETRY_INTERVAL_MS: &str = "SIMPLEWATCH_RETRY_INTERVAL_MS";
pub const ENV_EMPTY_RETRY_INTERVAL_MS: &str = "SIMPLEWATCH_EMPTY_RETRY_INTERVAL_MS";
pub const ENV_RELIST_ON_RECONNECT: &str = "SIMPLEWATCH_RELIST_ON_RECONNECT";
pub const ENV_SUBSCRIBER_CAPACITY: &str = "SIMPLEWATCH_SUBSCRIBER_CAPACITY";

/// Configuration for a [`super::WatchedResource`]
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Delay between supervisor ticks while resources exist or after a stream ended
    pub retry_interval: Duration,
    /// Delay between supervisor ticks after the probe reported an empty collection
    pub empty_retry_interval: Duration,
    /// Take a full list before each new session and drop cached names that are gone
    pub relist_on_reconnect: bool,
    /// How incoming representations are compared against cached ones
    pub change_detection: ChangeDetection,
    pub subscriber_capacity: usize,
    pub diagnostic_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            empty_retry_interval: Duration::from_millis(DEFAULT_EMPTY_RETRY_INTERVAL_MS),
            relist_on_reconnect: false,
            change_detection: ChangeDetection::default(),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            diagnostic_capacity: DEFAULT_DIAGNOSTIC_CAPACITY,
        }
    }
}

impl WatchConfig {
    /// Defaults overridden by `SIMPLEWATCH_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, ENV_RETRY_INTERVAL_MS) {
            config.retry_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_EMPTY_RETRY_INTERVAL_MS) {
            config.empty_retry_interval = Duration::from_millis(ms);
        }
        if let Some(relist) = parse_var::<bool>(&lookup, ENV_RELIST_ON_RECONNECT) {
            config.relist_on_reconnect = relist;
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, ENV_SUBSCRIBER_CAPACITY) {
            if capacity > 0 {
                config.subscriber_capacity = capacity;
            } else {
                warn!("Ignoring {}=0, channel capacity must be positive", ENV_SUBSCRIBER_CAPACITY);
            }
        }

        config
    }

    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_empty_retry_interval(mut self, interval: Duration) -> Self {
        self.empty_retry_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_relist_on_reconnect(mut self, relist: bool) -> Self {
        self.relist_on_reconnect = relist;
        self
    }

    #[must_use]
    pub const fn with_change_detection(mut self, detection: ChangeDetection) -> Self {
        self.change_detection = detection;
        self
    }

    #[must_use]
    pub const fn with_subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    raw.trim().parse::<T>().map_or_else(
        |_| {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        },
        Some,
    )
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_RETRY_INTERVAL_MS > 0, "DEFAULT_RETRY_INTERVAL_MS must be greater than 0");
    assert!(
        DEFAULT_EMPTY_RETRY_INTERVAL_MS >= DEFAULT_RETRY_INTERVAL_MS,
        "the empty-collection interval must not be shorter than the regular one"
    );
    assert!(PROBE_LIMIT > 0, "PROBE_LIMIT must be greater than 0");
    assert!(DEFAULT_SUBSCRIBER_CAPACITY > 0, "DEFAULT_SUBSCRIBER_CAPACITY must be greater than 0");
    assert!(DEFAULT_DIAGNOSTIC_CAPACITY > 0, "DEFAULT_DIAGNOSTIC_CAPACITY must be greater than 0");
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.empty_retry_interval, Duration::from_secs(10));
        assert!(!config.relist_on_reconnect);
        assert_eq!(config.change_detection, ChangeDetection::Structural);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_RETRY_INTERVAL_MS, "250"),
            (ENV_EMPTY_RETRY_INTERVAL_MS, "5000"),
            (ENV_RELIST_ON_RECONNECT, "true"),
            (ENV_SUBSCRIBER_CAPACITY, "bogus"),
        ]);
        let config = WatchConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(config.empty_retry_interval, Duration::from_secs(5));
        assert!(config.relist_on_reconnect);
        assert_eq!(config.subscriber_capacity, DEFAULT_SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = WatchConfig::default().with_subscriber_capacity(0);
        assert_eq!(config.subscriber_capacity, 1);
    }
}
