use fleetgate_core::InMemoryStore;
use fleetgate_latency::LatencyTracker;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("FleetGate Latency Tracker Example");
    println!("==================================\n");

    let tracker = LatencyTracker::with_defaults(InMemoryStore::new());

    println!("Recording samples for gpt-4 and claude-3...");
    for ms in [90, 110, 130, 1200, 140] {
        tracker.record("gpt-4", Duration::from_millis(ms)).await;
    }
    for ms in [2100, 2400, 1900] {
        tracker.record("claude-3", Duration::from_millis(ms)).await;
    }

    let gpt4 = tracker.get_stats("gpt-4").await;
    println!(
        "  gpt-4: avg={:.1}ms p95={:.1}ms samples={} health={:.0}",
        gpt4.average_ms,
        gpt4.p95_ms,
        gpt4.sample_count,
        tracker.health_score("gpt-4").await
    );

    let claude = tracker.get_stats("claude-3").await;
    println!(
        "  claude-3: avg={:.1}ms p95={:.1}ms samples={} health={:.0}",
        claude.average_ms,
        claude.p95_ms,
        claude.sample_count,
        tracker.health_score("claude-3").await
    );

    let unknown = tracker.get_stats("unknown-model").await;
    println!(
        "\n  unknown-model (no samples): health={:.0} (optimistic)",
        tracker.health_score("unknown-model").await
    );
    assert_eq!(unknown.sample_count, 0);
}
