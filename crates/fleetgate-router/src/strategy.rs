/// Pluggable instance-selection policy over an already-filtered candidate
/// set (spec.md §4.6). Strategies never mutate global state beyond the
/// group's shared round-robin counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingStrategy {
    /// `candidates[0]` — the registry pre-sorts by priority. Deterministic.
    Priority,
    /// Expands candidates proportionally to their configured weight and
    /// cycles the group's shared counter through the expansion.
    WeightedRoundRobin,
    /// Uniform pick across the candidate set.
    Random,
    /// Smallest windowed average latency, preferring zero-sample
    /// candidates over any measured latency above `unknown_beats_ms`.
    LeastLatency,
}

impl RoutingStrategy {
    /// Parses a configured strategy name. Unknown names fall back to
    /// [`RoutingStrategy::Priority`] (spec.md §4.6: "Unknown strategy names
    /// fall back to Priority with a warning").
    pub fn parse(name: &str) -> Self {
        match name {
            "priority" => RoutingStrategy::Priority,
            "weighted_round_robin" | "weighted-round-robin" => RoutingStrategy::WeightedRoundRobin,
            "random" => RoutingStrategy::Random,
            "least_latency" | "least-latency" => RoutingStrategy::LeastLatency,
            other => {
                #[cfg(feature = "tracing")]
                tracing::warn!(strategy = other, "unknown routing strategy, falling back to priority");
                #[cfg(not(feature = "tracing"))]
                let _ = other;
                RoutingStrategy::Priority
            }
        }
    }
}

impl Default for RoutingStrategy {
    fn default() -> Self {
        RoutingStrategy::Priority
    }
}
