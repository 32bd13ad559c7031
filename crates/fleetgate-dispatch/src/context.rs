//! The single root context every dispatched request is handled through.
//!
//! SPEC_FULL.md §9 / spec.md §9: "hold a single root context with the
//! loaded config, registry, and collaborator handles; pass explicitly
//! through constructors." `GatewayContext` is that context: one `Arc`-held
//! handle per collaborator, built once at process startup and cheaply
//! cloned (or shared by reference) into every request task.

use std::sync::Arc;

use fleetgate_breaker::Manager as BreakerManager;
use fleetgate_budget::BudgetService;
use fleetgate_cache::ResponseCache;
use fleetgate_core::SharedStore;
use fleetgate_latency::LatencyTracker;
use fleetgate_ratelimit::{
    FailOpen, InMemoryTokenBucketLimiter, RateLimiter, RateLimiterMode, SharedFixedWindowLimiter,
    SharedSlidingWindowLimiter,
};
use fleetgate_registry::ModelRegistry;
use fleetgate_retry::RetryController;
use fleetgate_router::{Router, RoutingStrategy};
use fleetgate_usage::SettlementWorker;

use crate::principal::PrincipalResolver;
use crate::provider::ProviderDialect;
use crate::shedding::LoadShedder;

/// Tuning the pipeline applies uniformly across principals, distinct from
/// per-principal budget/allow-list state (which lives on the resolved
/// [`crate::principal::Principal`] itself).
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub routing_strategy: RoutingStrategy,
    /// Which rate limiter backend admission checks run against. All three
    /// share the same [`RateLimiter`] contract; this only picks which one
    /// `GatewayContext::new` wires up.
    pub rate_limiter_mode: RateLimiterMode,
    /// Requests-per-minute applied to every principal's rate-limit scope.
    /// Per-principal overrides are a Non-goal (administration is out of
    /// scope); operators needing per-key limits configure separate
    /// deployments or a fronting proxy.
    pub default_requests_per_minute: u64,
    /// Fleet-wide average health score below which shedding is considered
    /// (passed straight through to [`LoadShedder`]).
    pub health_floor: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            routing_strategy: RoutingStrategy::default(),
            rate_limiter_mode: RateLimiterMode::default(),
            default_requests_per_minute: 600,
            health_floor: 50.0,
        }
    }
}

/// Every collaborator the dispatch pipeline needs, constructed once.
pub struct GatewayContext {
    pub registry: Arc<ModelRegistry>,
    pub router: Arc<Router>,
    pub breakers: Arc<BreakerManager>,
    pub latency: Arc<LatencyTracker>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub budget: Arc<BudgetService>,
    pub cache: Arc<ResponseCache>,
    pub settlement: Arc<SettlementWorker>,
    pub retry: Arc<RetryController>,
    pub principals: Arc<PrincipalResolver>,
    pub dialect: Arc<dyn ProviderDialect>,
    pub shedder: Arc<LoadShedder>,
    pub config: DispatchConfig,
}

impl GatewayContext {
    /// Assembles the context from already-constructed collaborators. Each
    /// leaf crate owns its own defaults/builders (`with_defaults`,
    /// `*Config::builder()`); `fleetgate-bin` is responsible for turning
    /// loaded configuration into these handles and calling this once.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn SharedStore>,
        registry: Arc<ModelRegistry>,
        router: Arc<Router>,
        breakers: Arc<BreakerManager>,
        latency: Arc<LatencyTracker>,
        budget: Arc<BudgetService>,
        cache: Arc<ResponseCache>,
        settlement: Arc<SettlementWorker>,
        retry: Arc<RetryController>,
        dialect: Arc<dyn ProviderDialect>,
        config: DispatchConfig,
    ) -> Self {
        let rate_limiter: Arc<dyn RateLimiter> = match config.rate_limiter_mode {
            RateLimiterMode::Sliding => Arc::new(FailOpen::new(SharedSlidingWindowLimiter::new(Arc::clone(&store)))),
            RateLimiterMode::Fixed => Arc::new(FailOpen::new(SharedFixedWindowLimiter::new(Arc::clone(&store)))),
            RateLimiterMode::TokenBucket => {
                let bucket = InMemoryTokenBucketLimiter::new();
                bucket.spawn_reaper();
                Arc::new(FailOpen::new(bucket))
            }
        };
        let principals = Arc::new(PrincipalResolver::new(store));

        Self {
            registry,
            router,
            breakers,
            latency,
            rate_limiter,
            budget,
            cache,
            settlement,
            retry,
            principals,
            dialect,
            shedder: Arc::new(LoadShedder::with_defaults()),
            config,
        }
    }

    /// The fleet-wide average health score across every known instance,
    /// consulted by the load shedder ahead of selection (spec.md §5). An
    /// empty registry is optimistic: 100.
    pub async fn average_health_score(&self) -> f64 {
        let instances = self.registry.list_all();
        if instances.is_empty() {
            return 100.0;
        }
        let mut total = 0.0;
        for instance in &instances {
            total += self.latency.health_score(&instance.id).await;
        }
        total / instances.len() as f64
    }
}
