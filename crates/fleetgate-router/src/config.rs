use crate::strategy::RoutingStrategy;

/// Tuning for a [`crate::Router`].
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub default_strategy: RoutingStrategy,
    /// Ceiling (ms) a zero-sample candidate is treated as tying against in
    /// [`RoutingStrategy::LeastLatency`] (spec.md §4.6, default 500ms).
    pub unknown_beats_ms: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_strategy: RoutingStrategy::Priority,
            unknown_beats_ms: 500.0,
        }
    }
}

impl RouterConfig {
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterConfigBuilder {
    default_strategy: Option<RoutingStrategy>,
    unknown_beats_ms: Option<f64>,
}

impl RouterConfigBuilder {
    pub fn default_strategy(mut self, strategy: RoutingStrategy) -> Self {
        self.default_strategy = Some(strategy);
        self
    }

    pub fn unknown_beats_ms(mut self, ms: f64) -> Self {
        self.unknown_beats_ms = Some(ms);
        self
    }

    pub fn build(self) -> RouterConfig {
        let defaults = RouterConfig::default();
        RouterConfig {
            default_strategy: self.default_strategy.unwrap_or(defaults.default_strategy),
            unknown_beats_ms: self.unknown_beats_ms.unwrap_or(defaults.unknown_beats_ms),
        }
    }
}
