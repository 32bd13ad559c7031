use crate::error::RateLimitError;
use crate::shared::RateLimiter;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    last_touched: Instant,
}

impl Bucket {
    fn new(limit: u64, window: Duration) -> Self {
        let capacity = limit as f64;
        let refill_per_sec = capacity / window.as_secs_f64().max(0.001);
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec,
            last_refill: Instant::now(),
            last_touched: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self, n: f64) -> bool {
        self.refill();
        self.last_touched = Instant::now();
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }
}

/// In-process token bucket used when the shared store is unavailable.
///
/// Each `(key, limit, window)` combination gets its own bucket sized to
/// `limit` tokens refilling at `limit / window` per second. A background
/// task reaps buckets untouched for over an hour so long-running replicas
/// don't accumulate one bucket per ex-principal forever.
pub struct InMemoryTokenBucketLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
}

impl InMemoryTokenBucketLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawns the idle-bucket reaper; call once per process.
    pub fn spawn_reaper(&self) -> tokio::task::JoinHandle<()> {
        let buckets = Arc::clone(&self.buckets);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(5 * 60));
            loop {
                ticker.tick().await;
                let cutoff = Instant::now() - Duration::from_secs(60 * 60);
                buckets.lock().retain(|_, bucket| bucket.last_touched >= cutoff);
            }
        })
    }
}

impl Default for InMemoryTokenBucketLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for InMemoryTokenBucketLimiter {
    async fn allow(&self, key: &str, n: u64, limit: u64, window: Duration) -> Result<bool, RateLimitError> {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(limit, window));
        Ok(bucket.try_take(n as f64))
    }

    async fn remaining(&self, key: &str, limit: u64, window: Duration) -> Result<u64, RateLimitError> {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(limit, window));
        Ok(bucket.available().floor() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_then_refills_over_time() {
        let limiter = InMemoryTokenBucketLimiter::new();
        let window = Duration::from_millis(100);

        assert!(limiter.allow("p1", 1, 2, window).await.unwrap());
        assert!(limiter.allow("p1", 1, 2, window).await.unwrap());
        assert!(!limiter.allow("p1", 1, 2, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(limiter.allow("p1", 1, 2, window).await.unwrap());
    }

    #[tokio::test]
    async fn keys_have_independent_buckets() {
        let limiter = InMemoryTokenBucketLimiter::new();
        let window = Duration::from_secs(60);

        assert!(limiter.allow("a", 1, 1, window).await.unwrap());
        assert!(!limiter.allow("a", 1, 1, window).await.unwrap());
        assert!(limiter.allow("b", 1, 1, window).await.unwrap());
    }
}
