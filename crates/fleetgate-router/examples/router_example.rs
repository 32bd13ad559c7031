use fleetgate_core::InMemoryStore;
use fleetgate_latency::LatencyTracker;
use fleetgate_registry::{ModelInstanceSpec, ModelRegistry};
use fleetgate_router::{Router, RouterConfig, RoutingStrategy};
use std::sync::Arc;
use std::time::Duration;

fn spec(id: &str, priority: u32, weight: u32) -> ModelInstanceSpec {
    ModelInstanceSpec {
        id: id.to_string(),
        logical_model: "gpt-4".to_string(),
        provider: "openai".to_string(),
        priority,
        weight,
        endpoint: "https://api.openai.com/v1".to_string(),
        credential: "sk-example".to_string(),
        enabled: true,
        tokens_per_minute: None,
        requests_per_minute: None,
        prompt_price_per_1k: 0.03,
        completion_price_per_1k: 0.06,
    }
}

#[tokio::main]
async fn main() {
    println!("FleetGate Routing Strategies Example");
    println!("=====================================\n");

    let registry = Arc::new(ModelRegistry::new(vec![
        spec("gpt4-primary", 0, 3),
        spec("gpt4-secondary", 1, 1),
    ]));
    let store = InMemoryStore::new();
    let latency = Arc::new(LatencyTracker::with_defaults(store));
    let router = Router::new(Arc::clone(&registry), Arc::clone(&latency), RouterConfig::default());

    let priority_pick = router.select("gpt-4", RoutingStrategy::Priority, &[]).await.unwrap();
    println!("Priority: always {}", priority_pick.id);

    println!("\nWeighted round-robin over 8 selections:");
    for _ in 0..8 {
        let pick = router.select("gpt-4", RoutingStrategy::WeightedRoundRobin, &[]).await.unwrap();
        print!("{} ", pick.id);
    }
    println!();

    latency.record("gpt4-primary", Duration::from_millis(800)).await;
    latency.record("gpt4-secondary", Duration::from_millis(90)).await;
    let fastest = router.select("gpt-4", RoutingStrategy::LeastLatency, &[]).await.unwrap();
    println!("\nLeast-latency after recording samples: {}", fastest.id);

    let fallback = router
        .select("gpt-4", RoutingStrategy::Priority, &["gpt4-primary".to_string()])
        .await
        .unwrap();
    println!("Priority excluding gpt4-primary: {}", fallback.id);
}
