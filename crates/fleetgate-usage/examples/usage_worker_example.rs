use fleetgate_budget::{BudgetService, EntityKind, Period};
use fleetgate_core::InMemoryStore;
use fleetgate_usage::{SettlementWorker, UsageEvent};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    println!("FleetGate Usage Settlement Worker Example");
    println!("==========================================\n");

    let store = InMemoryStore::new();
    let budget = Arc::new(BudgetService::with_defaults(store.clone()));
    budget
        .configure_limit(EntityKind::Key, "key-prod-1", Some(20.0), Period::Daily)
        .await
        .unwrap();

    let worker = SettlementWorker::with_defaults(store, Arc::clone(&budget));

    for (i, cost) in [0.40, 0.55, 0.30].into_iter().enumerate() {
        worker
            .enqueue(&UsageEvent {
                request_id: format!("req-{i}"),
                team_id: None,
                user_id: None,
                key_id: "key-prod-1".to_string(),
                model: "gpt-4".to_string(),
                instance_id: "gpt-4-east-1".to_string(),
                prompt_tokens: 210,
                completion_tokens: 90,
                cost,
                latency_ms: 640,
                cache_hit: false,
                error: None,
                recorded_at_ms: 0,
            })
            .await
            .unwrap();
    }

    println!("Enqueued 3 usage events, draining batch...");
    let drained = worker.run_once().await;
    println!("  drained {drained} events");

    let decision = budget.check_budget(None, None, "key-prod-1", 15.0).await;
    println!("\nChecking remaining budget after settlement: {decision:?}");
}
