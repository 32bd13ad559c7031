//! FleetGate gateway process entry point.
//!
//! Loads [`config::GatewayConfig`] once from `config.toml` (path overridable
//! via `FLEETGATE_CONFIG`), builds every collaborator crate's handle into a
//! single [`fleetgate_dispatch::GatewayContext`] (SPEC_FULL.md §9: "hold a
//! single root context ... pass explicitly through constructors"), spawns
//! the settlement worker loop, and serves the `fleetgate-server` router
//! until SIGINT/SIGTERM.

mod config;

use std::sync::Arc;

use fleetgate_breaker::{BreakerConfig, Manager as BreakerManager};
use fleetgate_budget::{BudgetConfig, BudgetService, EntityKind, Period};
use fleetgate_cache::{CacheConfig, ResponseCache};
use fleetgate_core::InMemoryStore;
use fleetgate_dispatch::{credential_hash, DispatchConfig, GatewayContext, OpenAiDialect};
use fleetgate_latency::{LatencyConfig, LatencyTracker};
use fleetgate_registry::ModelRegistry;
use fleetgate_retry::{RetryController, RetryPolicy};
use fleetgate_ratelimit::RateLimiterMode;
use fleetgate_router::{Router, RouterConfig, RoutingStrategy};
use fleetgate_usage::{SettlementWorker, WorkerConfig};

use config::GatewayConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config_path = std::env::var("FLEETGATE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = match GatewayConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, path = %config_path, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(error = %err, "invalid listen address");
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(build_context(&config).await);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let settlement = Arc::clone(&ctx.settlement);
    let worker_rx = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move {
        settlement.run(worker_rx).await;
    });

    let app = fleetgate_server::build_router(Arc::clone(&ctx));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind listen address");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, instances = ctx.registry.stats().total_instances, "fleetgate listening");

    let serve = axum::serve(listener, app.into_make_service());
    tokio::select! {
        result = serve => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining settlement queue");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Wires every collaborator crate's handle from the loaded configuration,
/// following the dependency order spec.md §2 lists leaves-first.
async fn build_context(config: &GatewayConfig) -> GatewayContext {
    let store = InMemoryStore::new();

    let registry = Arc::new(ModelRegistry::new(config.model_list.clone()));

    let latency = Arc::new(LatencyTracker::new(
        Arc::clone(&store) as Arc<dyn fleetgate_core::SharedStore>,
        LatencyConfig::builder()
            .window(std::time::Duration::from_secs(config.latency.window_s))
            .max_samples(config.latency.max_samples)
            .build(),
    ));

    let router_config = RouterConfig::builder()
        .default_strategy(RoutingStrategy::parse(&config.router.strategy))
        .build();
    let router = Arc::new(Router::new(Arc::clone(&registry), Arc::clone(&latency), router_config));

    let breakers = Arc::new(BreakerManager::new(
        BreakerConfig::builder()
            .failure_threshold(config.router.failure_threshold)
            .slow_threshold(config.router.slow_limit)
            .slow_call_duration(config.router.slow_call_duration())
            .cooldown(config.router.cooldown())
            .build(),
    ));

    let budget = Arc::new(BudgetService::new(
        Arc::clone(&store) as Arc<dyn fleetgate_core::SharedStore>,
        BudgetConfig::default(),
    ));
    seed_budgets(&budget, config).await;

    let cache = Arc::new(ResponseCache::new(
        Arc::clone(&store) as Arc<dyn fleetgate_core::SharedStore>,
        CacheConfig::builder()
            .enabled(config.cache.enabled)
            .ttl(std::time::Duration::from_secs(config.cache.ttl_s))
            .build(),
    ));

    let settlement = Arc::new(SettlementWorker::new(
        Arc::clone(&store) as Arc<dyn fleetgate_core::SharedStore>,
        Arc::clone(&budget),
        WorkerConfig::builder()
            .batch_size(config.worker.batch_size)
            .processing_interval(std::time::Duration::from_secs(config.worker.interval_s))
            .retry(RetryPolicy::builder().max_attempts(config.worker.max_retries).build())
            .build(),
    ));

    let retry = Arc::new(RetryController::new(
        RetryPolicy::builder()
            .max_attempts(config.router.retry.max_attempts)
            .initial_delay(config.router.retry.initial_delay())
            .max_delay(config.router.retry.max_delay())
            .multiplier(config.router.retry.multiplier)
            .jitter(config.router.retry.jitter)
            .build(),
    ));

    seed_keys(&store, config).await;

    let dispatch_config = DispatchConfig {
        routing_strategy: RoutingStrategy::parse(&config.router.strategy),
        rate_limiter_mode: RateLimiterMode::parse(&config.ratelimit.mode),
        default_requests_per_minute: config.default_requests_per_minute,
        health_floor: config.health_floor,
    };

    GatewayContext::new(
        store as Arc<dyn fleetgate_core::SharedStore>,
        registry,
        router,
        breakers,
        latency,
        budget,
        cache,
        settlement,
        retry,
        Arc::new(OpenAiDialect::new()),
        dispatch_config,
    )
}

/// Seeds the shared store with the `principal:key:<hash>` records the
/// config declares. Standalone/dev bootstrap only — key administration
/// (issuing/rotating/revoking at runtime) is out of scope (spec.md §1).
async fn seed_keys(store: &Arc<InMemoryStore>, config: &GatewayConfig) {
    const SEED_TTL: std::time::Duration = std::time::Duration::from_secs(400 * 86_400);
    for seed in &config.key_list {
        let hash = credential_hash(&seed.credential);
        let key = format!("principal:key:{hash}");
        let fields = seed.to_store_fields();
        if let Err(err) = fleetgate_core::SharedStore::hset_ex(store.as_ref(), &key, fields, SEED_TTL).await {
            tracing::warn!(error = %err, key_id = %seed.id, "failed to seed principal key record");
        }
    }
}

async fn seed_budgets(budget: &Arc<BudgetService>, config: &GatewayConfig) {
    for seed in &config.key_list {
        let Some(max) = seed.budget_max else { continue };
        let period = Period::parse(&seed.budget_period);
        if let Err(err) = budget.configure_limit(EntityKind::Key, &seed.id, Some(max), period).await {
            tracing::warn!(error = %err, key_id = %seed.id, "failed to seed budget limit");
        }
    }
}
