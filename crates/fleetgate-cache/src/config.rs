use std::time::Duration;

/// Tuning for [`crate::ResponseCache`], sourced from `cache.*` configuration
/// keys (spec.md §6).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master on/off switch (`cache.enabled`).
    pub enabled: bool,
    /// TTL applied to stored entries (`cache.ttl_s`).
    pub ttl: Duration,
    /// How long a single-flight follower waits for the leader before giving
    /// up and treating the request as a miss.
    pub single_flight_wait: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
            single_flight_wait: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    enabled: Option<bool>,
    ttl: Option<Duration>,
    single_flight_wait: Option<Duration>,
}

impl CacheConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn single_flight_wait(mut self, wait: Duration) -> Self {
        self.single_flight_wait = Some(wait);
        self
    }

    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();
        CacheConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            ttl: self.ttl.unwrap_or(defaults.ttl),
            single_flight_wait: self.single_flight_wait.unwrap_or(defaults.single_flight_wait),
        }
    }
}
