use fleetgate_budget::{BudgetService, EntityKind, Period};
use fleetgate_core::InMemoryStore;

#[tokio::main]
async fn main() {
    println!("FleetGate Budget Service Example");
    println!("==================================\n");

    let service = BudgetService::with_defaults(InMemoryStore::new());

    service
        .configure_limit(EntityKind::Team, "team-acme", Some(500.0), Period::Monthly)
        .await
        .unwrap();
    service
        .configure_limit(EntityKind::Key, "key-prod-1", Some(50.0), Period::Daily)
        .await
        .unwrap();

    println!("Checking a modest request against team + key limits...");
    let decision = service.check_budget(Some("team-acme"), None, "key-prod-1", 2.50).await;
    println!("  decision: {decision:?}\n");
    assert!(decision.is_allowed());

    service.apply_usage(EntityKind::Key, "key-prod-1", 48.0).await.unwrap();

    println!("Checking a request that would push the key over its daily limit...");
    let decision = service.check_budget(Some("team-acme"), None, "key-prod-1", 5.0).await;
    println!("  decision: {decision:?}");
    assert!(!decision.is_allowed());

    println!("\nChecking via the cached hot path...");
    let cached = service.check_budget_cached(Some("team-acme"), None, "key-prod-1", 5.0).await;
    println!("  cached decision: {cached:?}");
    assert!(!cached.is_allowed());
}
