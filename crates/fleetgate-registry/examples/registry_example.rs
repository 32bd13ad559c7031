use fleetgate_registry::{ModelInstanceSpec, ModelRegistry};

fn spec(id: &str, model: &str, priority: u32, weight: u32) -> ModelInstanceSpec {
    ModelInstanceSpec {
        id: id.to_string(),
        logical_model: model.to_string(),
        provider: "openai".to_string(),
        priority,
        weight,
        endpoint: "https://api.openai.com/v1".to_string(),
        credential: "sk-example".to_string(),
        enabled: true,
        tokens_per_minute: Some(60_000),
        requests_per_minute: Some(500),
        prompt_price_per_1k: 0.03,
        completion_price_per_1k: 0.06,
    }
}

fn main() {
    println!("FleetGate Model Registry Example");
    println!("=================================\n");

    let registry = ModelRegistry::new(vec![
        spec("gpt4-primary", "gpt-4", 0, 3),
        spec("gpt4-secondary", "gpt-4", 1, 1),
        spec("claude-primary", "claude-3", 0, 1),
    ]);

    let candidates = registry.resolve("gpt-4");
    println!("gpt-4 candidates (priority order):");
    for instance in &candidates {
        println!("  {} priority={} weight={}", instance.id, instance.priority, instance.weight);
    }

    let stats = registry.stats();
    println!(
        "\nregistry stats: {} groups, {}/{} instances enabled",
        stats.group_count, stats.enabled_instances, stats.total_instances
    );

    println!("\nreloading with gpt4-secondary disabled...");
    registry.reload(vec![
        spec("gpt4-primary", "gpt-4", 0, 3),
        {
            let mut s = spec("gpt4-secondary", "gpt-4", 1, 1);
            s.enabled = false;
            s
        },
    ]);
    println!("gpt-4 candidates after reload: {:?}", registry.resolve("gpt-4").iter().map(|i| i.id.clone()).collect::<Vec<_>>());
}
