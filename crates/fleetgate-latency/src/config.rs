use std::time::Duration;

/// Tuning for the [`crate::LatencyTracker`]; one `LatencyConfig` covers every
/// model the tracker is asked about.
#[derive(Debug, Clone)]
pub struct LatencyConfig {
    /// Samples older than this are discarded on read (and opportunistically on write).
    pub window: Duration,
    /// Hard cap on samples retained per model; oldest are trimmed past this.
    pub max_samples: usize,
    /// Smoothing factor for the local per-instance moving average, in `(0, 1]`.
    pub local_average_alpha: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5 * 60),
            max_samples: 1000,
            local_average_alpha: 0.2,
        }
    }
}

impl LatencyConfig {
    pub fn builder() -> LatencyConfigBuilder {
        LatencyConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LatencyConfigBuilder {
    window: Option<Duration>,
    max_samples: Option<usize>,
    local_average_alpha: Option<f64>,
}

impl LatencyConfigBuilder {
    pub fn window(mut self, d: Duration) -> Self {
        self.window = Some(d);
        self
    }

    pub fn max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n);
        self
    }

    pub fn local_average_alpha(mut self, a: f64) -> Self {
        self.local_average_alpha = Some(a);
        self
    }

    pub fn build(self) -> LatencyConfig {
        let defaults = LatencyConfig::default();
        LatencyConfig {
            window: self.window.unwrap_or(defaults.window),
            max_samples: self.max_samples.unwrap_or(defaults.max_samples),
            local_average_alpha: self.local_average_alpha.unwrap_or(defaults.local_average_alpha),
        }
    }
}
