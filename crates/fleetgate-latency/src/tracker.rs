use crate::config::LatencyConfig;
use crate::health::health_score;
use crate::stats::LatencyStats;
use fleetgate_core::SharedStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static SAMPLE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Distributed, time-windowed view of per-model latencies.
///
/// Every operation tolerates a failing shared store: reads return the
/// well-defined empty/optimistic sentinel and writes are best-effort,
/// because a latency observation is never allowed to fail the request that
/// produced it (spec: "they never propagate the error to the dispatch
/// pipeline").
pub struct LatencyTracker {
    store: Arc<dyn SharedStore>,
    config: LatencyConfig,
}

impl LatencyTracker {
    pub fn new(store: Arc<dyn SharedStore>, config: LatencyConfig) -> Self {
        Self { store, config }
    }

    pub fn with_defaults(store: Arc<dyn SharedStore>) -> Self {
        Self::new(store, LatencyConfig::default())
    }

    fn sample_key(model: &str) -> String {
        format!("latency:samples:{model}")
    }

    /// Appends one sample and opportunistically prunes the window.
    pub async fn record(&self, model: &str, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let now_ns = now_nanos();
        let disambiguator = SAMPLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let member = format!("{now_ns}:{latency_ms}:{disambiguator}");
        let key = Self::sample_key(model);

        if let Err(err) = self.store.zadd(&key, now_ns as f64, member).await {
            log_degraded("record", model, &err);
            return;
        }

        let min_score = now_ns as f64 - self.config.window.as_nanos() as f64;
        let _ = self.store.zremrangebyscore(&key, f64::MIN, min_score).await;
        let _ = self.store.ztrim_to(&key, self.config.max_samples).await;
    }

    /// Computed statistics over the current window. Never errors; a store
    /// failure or an empty window both yield [`LatencyStats::EMPTY`].
    pub async fn get_stats(&self, model: &str) -> LatencyStats {
        let key = Self::sample_key(model);
        let members = match self.store.zrange_all(&key).await {
            Ok(members) => members,
            Err(err) => {
                log_degraded("get_stats", model, &err);
                return LatencyStats::EMPTY;
            }
        };

        let min_score = now_nanos() as f64 - self.config.window.as_nanos() as f64;
        let mut latencies = Vec::with_capacity(members.len());
        let mut last_updated_ms: Option<u64> = None;

        for member in members {
            if member.score < min_score {
                continue;
            }
            if let Some(latency_ms) = parse_latency_ms(&member.member) {
                latencies.push(latency_ms);
            }
            let ts_ms = (member.score / 1_000_000.0) as u64;
            last_updated_ms = Some(last_updated_ms.map_or(ts_ms, |prev| prev.max(ts_ms)));
        }

        LatencyStats::compute(latencies, last_updated_ms)
    }

    /// `[0, 100]` health score from the windowed average. An empty window
    /// (no samples, or a degraded store) is optimistic: 100.
    pub async fn health_score(&self, model: &str) -> f64 {
        let stats = self.get_stats(model).await;
        if stats.sample_count == 0 {
            return 100.0;
        }
        health_score(stats.average_ms)
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_nanos()
}

/// Parses the `<ts_ns>:<latency_ms>:<disambiguator>` member format.
fn parse_latency_ms(member: &str) -> Option<f64> {
    member.split(':').nth(1)?.parse().ok()
}

#[cfg(feature = "tracing")]
fn log_degraded(op: &str, model: &str, err: &fleetgate_core::StoreError) {
    tracing::warn!(op, model, error = %err, "latency tracker degraded to sentinel after store failure");
}

#[cfg(not(feature = "tracing"))]
fn log_degraded(_op: &str, _model: &str, _err: &fleetgate_core::StoreError) {}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgate_core::InMemoryStore;

    #[tokio::test]
    async fn no_samples_yields_empty_stats_and_optimistic_health() {
        let tracker = LatencyTracker::with_defaults(InMemoryStore::new());
        let stats = tracker.get_stats("gpt-4").await;
        assert_eq!(stats, LatencyStats::EMPTY);
        assert_eq!(tracker.health_score("gpt-4").await, 100.0);
    }

    #[tokio::test]
    async fn records_round_trip_into_stats() {
        let tracker = LatencyTracker::with_defaults(InMemoryStore::new());
        for ms in [100, 200, 300, 400, 500] {
            tracker.record("gpt-4", Duration::from_millis(ms)).await;
        }
        let stats = tracker.get_stats("gpt-4").await;
        assert_eq!(stats.sample_count, 5);
        assert_eq!(stats.average_ms, 300.0);
        assert!(stats.last_updated_ms.is_some());
    }

    #[tokio::test]
    async fn samples_outside_window_are_excluded_on_read() {
        let config = LatencyConfig::builder().window(Duration::from_millis(20)).build();
        let tracker = LatencyTracker::new(InMemoryStore::new(), config);
        tracker.record("gpt-4", Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        tracker.record("gpt-4", Duration::from_millis(60)).await;

        let stats = tracker.get_stats("gpt-4").await;
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.average_ms, 60.0);
    }

    #[tokio::test]
    async fn max_samples_trims_oldest_on_write() {
        let config = LatencyConfig::builder().max_samples(3).build();
        let tracker = LatencyTracker::new(InMemoryStore::new(), config);
        for ms in 1..=5u64 {
            tracker.record("gpt-4", Duration::from_millis(ms * 100)).await;
        }
        let stats = tracker.get_stats("gpt-4").await;
        assert_eq!(stats.sample_count, 3);
    }

    #[tokio::test]
    async fn distinct_models_are_tracked_independently() {
        let tracker = LatencyTracker::with_defaults(InMemoryStore::new());
        tracker.record("gpt-4", Duration::from_millis(100)).await;
        tracker.record("claude-3", Duration::from_millis(900)).await;

        assert_eq!(tracker.get_stats("gpt-4").await.average_ms, 100.0);
        assert_eq!(tracker.get_stats("claude-3").await.average_ms, 900.0);
    }
}
