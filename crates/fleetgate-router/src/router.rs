use crate::config::RouterConfig;
use crate::strategy::RoutingStrategy;
use fleetgate_latency::LatencyTracker;
use fleetgate_registry::{ModelInstance, ModelRegistry};
use rand::Rng;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Selects one instance from a logical model's candidate set according to a
/// [`RoutingStrategy`] (spec.md §4.6).
///
/// Candidates are resolved fresh from the registry on every call (already
/// enabled-only, priority-sorted); this crate never caches them, so a
/// concurrent `reload` is always reflected on the next selection.
pub struct Router {
    registry: Arc<ModelRegistry>,
    latency: Arc<LatencyTracker>,
    config: RouterConfig,
}

impl Router {
    pub fn new(registry: Arc<ModelRegistry>, latency: Arc<LatencyTracker>, config: RouterConfig) -> Self {
        Self {
            registry,
            latency,
            config,
        }
    }

    /// Selects one instance for `logical_model`, excluding any id present in
    /// `excluded` (used by the retry controller to realize fallback to a
    /// different instance). Returns `None` when no candidate remains.
    pub async fn select(
        &self,
        logical_model: &str,
        strategy: RoutingStrategy,
        excluded: &[String],
    ) -> Option<ModelInstance> {
        let candidates: Vec<ModelInstance> = self
            .registry
            .resolve(logical_model)
            .into_iter()
            .filter(|instance| !excluded.iter().any(|id| id == &instance.id))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        match strategy {
            RoutingStrategy::Priority => Some(candidates[0].clone()),
            RoutingStrategy::Random => {
                let idx = rand::thread_rng().gen_range(0..candidates.len());
                Some(candidates[idx].clone())
            }
            RoutingStrategy::WeightedRoundRobin => self.select_weighted_round_robin(logical_model, &candidates),
            RoutingStrategy::LeastLatency => self.select_least_latency(&candidates).await,
        }
    }

    fn select_weighted_round_robin(&self, logical_model: &str, candidates: &[ModelInstance]) -> Option<ModelInstance> {
        let expanded = expand_by_weight(candidates);
        if expanded.is_empty() {
            return None;
        }
        let counter = self
            .registry
            .group(logical_model)
            .map(|group| group.round_robin_counter().fetch_add(1, Ordering::Relaxed))
            .unwrap_or(0);
        Some(expanded[counter % expanded.len()].clone())
    }

    async fn select_least_latency(&self, candidates: &[ModelInstance]) -> Option<ModelInstance> {
        let mut best: Option<(ModelInstance, f64)> = None;

        for candidate in candidates {
            let stats = self.latency.get_stats(&candidate.id).await;
            let effective_ms = if stats.sample_count > 0 {
                stats.average_ms
            } else if let Some(local) = candidate.local_average_latency_ms() {
                local
            } else {
                self.config.unknown_beats_ms
            };

            match &best {
                Some((_, best_ms)) if *best_ms <= effective_ms => {}
                _ => best = Some((candidate.clone(), effective_ms)),
            }
        }

        best.map(|(instance, _)| instance)
    }
}

/// Expands candidates proportionally to `weight`, preserving priority order
/// within each expansion, so a round-robin cycle over the result visits
/// heavier-weighted instances more often (spec.md §4.6).
fn expand_by_weight(candidates: &[ModelInstance]) -> Vec<ModelInstance> {
    let mut expanded = Vec::new();
    for candidate in candidates {
        for _ in 0..candidate.weight.max(1) {
            expanded.push(candidate.clone());
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgate_core::InMemoryStore;
    use fleetgate_registry::ModelInstanceSpec;
    use std::time::Duration;

    fn spec(id: &str, model: &str, priority: u32, weight: u32) -> ModelInstanceSpec {
        ModelInstanceSpec {
            id: id.to_string(),
            logical_model: model.to_string(),
            provider: "openai".to_string(),
            priority,
            weight,
            endpoint: "https://example.invalid".to_string(),
            credential: "sk-test".to_string(),
            enabled: true,
            tokens_per_minute: None,
            requests_per_minute: None,
            prompt_price_per_1k: 0.0,
            completion_price_per_1k: 0.0,
        }
    }

    fn router(registry: ModelRegistry) -> Router {
        Router::new(
            Arc::new(registry),
            Arc::new(LatencyTracker::with_defaults(InMemoryStore::new())),
            RouterConfig::default(),
        )
    }

    #[tokio::test]
    async fn priority_returns_first_candidate() {
        let registry = ModelRegistry::new(vec![spec("b", "gpt-4", 1, 1), spec("a", "gpt-4", 0, 1)]);
        let router = router(registry);
        let selected = router.select("gpt-4", RoutingStrategy::Priority, &[]).await.unwrap();
        assert_eq!(selected.id, "a");
    }

    #[tokio::test]
    async fn priority_respects_exclusion_list() {
        let registry = ModelRegistry::new(vec![spec("b", "gpt-4", 1, 1), spec("a", "gpt-4", 0, 1)]);
        let router = router(registry);
        let selected = router
            .select("gpt-4", RoutingStrategy::Priority, &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(selected.id, "b");
    }

    #[tokio::test]
    async fn no_candidates_returns_none() {
        let registry = ModelRegistry::new(vec![spec("a", "gpt-4", 0, 1)]);
        let router = router(registry);
        assert!(router
            .select("gpt-4", RoutingStrategy::Priority, &["a".to_string()])
            .await
            .is_none());
        assert!(router.select("unknown-model", RoutingStrategy::Priority, &[]).await.is_none());
    }

    #[tokio::test]
    async fn weighted_round_robin_visits_heavier_instance_more_often() {
        let registry = Arc::new(ModelRegistry::new(vec![spec("heavy", "gpt-4", 0, 3), spec("light", "gpt-4", 1, 1)]));
        let router = Router::new(
            Arc::clone(&registry),
            Arc::new(LatencyTracker::with_defaults(InMemoryStore::new())),
            RouterConfig::default(),
        );

        let mut heavy_count = 0;
        let mut light_count = 0;
        for _ in 0..8 {
            let selected = router.select("gpt-4", RoutingStrategy::WeightedRoundRobin, &[]).await.unwrap();
            if selected.id == "heavy" {
                heavy_count += 1;
            } else {
                light_count += 1;
            }
        }
        assert_eq!(heavy_count, 6);
        assert_eq!(light_count, 2);
    }

    #[tokio::test]
    async fn least_latency_prefers_lower_measured_average() {
        let registry = ModelRegistry::new(vec![spec("slow", "gpt-4", 0, 1), spec("fast", "gpt-4", 1, 1)]);
        let store = InMemoryStore::new();
        let latency = Arc::new(LatencyTracker::with_defaults(store));
        latency.record("slow", Duration::from_millis(900)).await;
        latency.record("fast", Duration::from_millis(100)).await;

        let router = Router::new(Arc::new(registry), latency, RouterConfig::default());
        let selected = router.select("gpt-4", RoutingStrategy::LeastLatency, &[]).await.unwrap();
        assert_eq!(selected.id, "fast");
    }

    #[tokio::test]
    async fn least_latency_cold_start_candidate_beats_a_slow_measured_one() {
        let registry = ModelRegistry::new(vec![spec("slow", "gpt-4", 0, 1), spec("cold", "gpt-4", 1, 1)]);
        let store = InMemoryStore::new();
        let latency = Arc::new(LatencyTracker::with_defaults(store));
        latency.record("slow", Duration::from_millis(900)).await;
        // "cold" has no samples recorded at all.

        let router = Router::new(Arc::new(registry), latency, RouterConfig::default());
        let selected = router.select("gpt-4", RoutingStrategy::LeastLatency, &[]).await.unwrap();
        assert_eq!(selected.id, "cold");
    }

    #[tokio::test]
    async fn least_latency_measured_below_ceiling_beats_cold_start() {
        let registry = ModelRegistry::new(vec![spec("warm", "gpt-4", 0, 1), spec("cold", "gpt-4", 1, 1)]);
        let store = InMemoryStore::new();
        let latency = Arc::new(LatencyTracker::with_defaults(store));
        latency.record("warm", Duration::from_millis(50)).await;

        let router = Router::new(Arc::new(registry), latency, RouterConfig::default());
        let selected = router.select("gpt-4", RoutingStrategy::LeastLatency, &[]).await.unwrap();
        assert_eq!(selected.id, "warm");
    }
}
