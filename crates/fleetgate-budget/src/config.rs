use std::time::Duration;

/// Tuning for the [`crate::BudgetService`].
#[derive(Debug, Clone, Copy)]
pub struct BudgetConfig {
    /// TTL of the cached precheck hash (spec.md §3: "TTL 5 min").
    pub cache_ttl: Duration,
    /// TTL applied to the durable counter hash on every write. The shared
    /// store has no non-expiring hash primitive, so counters are kept
    /// alive with a long-lived TTL refreshed on each read/write rather than
    /// a true indefinite lifetime.
    pub counter_ttl: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            counter_ttl: Duration::from_secs(400 * 86_400),
        }
    }
}

impl BudgetConfig {
    pub fn builder() -> BudgetConfigBuilder {
        BudgetConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetConfigBuilder {
    cache_ttl: Option<Duration>,
    counter_ttl: Option<Duration>,
}

impl BudgetConfigBuilder {
    pub fn cache_ttl(mut self, d: Duration) -> Self {
        self.cache_ttl = Some(d);
        self
    }

    pub fn counter_ttl(mut self, d: Duration) -> Self {
        self.counter_ttl = Some(d);
        self
    }

    pub fn build(self) -> BudgetConfig {
        let defaults = BudgetConfig::default();
        BudgetConfig {
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            counter_ttl: self.counter_ttl.unwrap_or(defaults.counter_ttl),
        }
    }
}
