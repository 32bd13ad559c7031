use std::time::Duration;

/// Tuning shared by every breaker a [`crate::Manager`] creates.
///
/// Unlike the per-service layer this crate started from, one `BreakerConfig`
/// governs every instance's breaker — instances differ in their recorded
/// outcomes, not in their thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip Closed -> Open.
    pub failure_threshold: usize,
    /// Slow-call count within the rolling window that also trips Open.
    pub slow_threshold: usize,
    /// Size of the rolling window slow calls are counted over.
    pub window_size: usize,
    /// Calls at or above this duration count as slow.
    pub slow_call_duration: Duration,
    /// How long Open is held before allowing a HalfOpen probe.
    pub cooldown: Duration,
    /// Probe calls permitted while HalfOpen.
    pub halfopen_probes: usize,
    /// Consecutive HalfOpen successes required to close again.
    pub halfopen_successes_required: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            slow_threshold: 10,
            window_size: 100,
            slow_call_duration: Duration::from_secs(2),
            cooldown: Duration::from_secs(30),
            halfopen_probes: 3,
            halfopen_successes_required: 2,
        }
    }
}

impl BreakerConfig {
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BreakerConfigBuilder {
    failure_threshold: Option<usize>,
    slow_threshold: Option<usize>,
    window_size: Option<usize>,
    slow_call_duration: Option<Duration>,
    cooldown: Option<Duration>,
    halfopen_probes: Option<usize>,
    halfopen_successes_required: Option<usize>,
}

impl BreakerConfigBuilder {
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = Some(n);
        self
    }

    pub fn slow_threshold(mut self, n: usize) -> Self {
        self.slow_threshold = Some(n);
        self
    }

    pub fn window_size(mut self, n: usize) -> Self {
        self.window_size = Some(n);
        self
    }

    pub fn slow_call_duration(mut self, d: Duration) -> Self {
        self.slow_call_duration = Some(d);
        self
    }

    pub fn cooldown(mut self, d: Duration) -> Self {
        self.cooldown = Some(d);
        self
    }

    pub fn halfopen_probes(mut self, n: usize) -> Self {
        self.halfopen_probes = Some(n);
        self
    }

    pub fn halfopen_successes_required(mut self, n: usize) -> Self {
        self.halfopen_successes_required = Some(n);
        self
    }

    pub fn build(self) -> BreakerConfig {
        let defaults = BreakerConfig::default();
        BreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            slow_threshold: self.slow_threshold.unwrap_or(defaults.slow_threshold),
            window_size: self.window_size.unwrap_or(defaults.window_size),
            slow_call_duration: self.slow_call_duration.unwrap_or(defaults.slow_call_duration),
            cooldown: self.cooldown.unwrap_or(defaults.cooldown),
            halfopen_probes: self.halfopen_probes.unwrap_or(defaults.halfopen_probes),
            halfopen_successes_required: self
                .halfopen_successes_required
                .unwrap_or(defaults.halfopen_successes_required),
        }
    }
}
