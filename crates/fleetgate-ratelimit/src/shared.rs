use crate::error::RateLimitError;
use async_trait::async_trait;
use fleetgate_core::SharedStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A keyed rate limiter: `n` permits are requested against `limit` over a
/// rolling or fixed `window`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, key: &str, n: u64, limit: u64, window: Duration) -> Result<bool, RateLimitError>;

    async fn remaining(&self, key: &str, limit: u64, window: Duration) -> Result<u64, RateLimitError>;
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos()
}

/// Sliding-window limiter backed by a sorted set in the shared store.
///
/// Each permit is recorded as a distinct member scored by its acquisition
/// time; members older than `window` are dropped before counting.
pub struct SharedSlidingWindowLimiter {
    store: Arc<dyn SharedStore>,
}

impl SharedSlidingWindowLimiter {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    fn zkey(key: &str) -> String {
        format!("ratelimit:sliding:{key}")
    }
}

#[async_trait]
impl RateLimiter for SharedSlidingWindowLimiter {
    async fn allow(&self, key: &str, n: u64, limit: u64, window: Duration) -> Result<bool, RateLimitError> {
        let zkey = Self::zkey(key);
        let now = now_nanos() as f64;
        let window_start = now - window.as_nanos() as f64;

        self.store.zremrangebyscore(&zkey, f64::MIN, window_start).await?;
        let count = self.store.zcard(&zkey).await? as u64;

        if count + n > limit {
            return Ok(false);
        }

        for i in 0..n {
            let member = format!("{now}:{i}:{:x}", rand::random::<u32>());
            self.store.zadd(&zkey, now + i as f64, member).await?;
        }
        // Re-set TTL via an incr no-op would be wasteful; a short-lived key
        // expiring via its own sliding window membership is enough here, so
        // only bound total growth with a hard cap keyed by `limit`.
        self.store.ztrim_to(&zkey, limit.max(1) as usize * 2).await?;
        Ok(true)
    }

    async fn remaining(&self, key: &str, limit: u64, window: Duration) -> Result<u64, RateLimitError> {
        let zkey = Self::zkey(key);
        let now = now_nanos() as f64;
        let window_start = now - window.as_nanos() as f64;
        self.store.zremrangebyscore(&zkey, f64::MIN, window_start).await?;
        let count = self.store.zcard(&zkey).await? as u64;
        Ok(limit.saturating_sub(count))
    }
}

/// Fixed-window limiter backed by an atomic counter in the shared store.
///
/// The key is suffixed by the current window index (`now / window`), so a
/// new counter — and a fresh TTL — starts automatically at each boundary.
pub struct SharedFixedWindowLimiter {
    store: Arc<dyn SharedStore>,
}

impl SharedFixedWindowLimiter {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    fn counter_key(key: &str, window: Duration) -> String {
        let window_secs = window.as_secs().max(1);
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs();
        let bucket = now_secs / window_secs;
        format!("ratelimit:fixed:{key}:{bucket}")
    }
}

#[async_trait]
impl RateLimiter for SharedFixedWindowLimiter {
    async fn allow(&self, key: &str, n: u64, limit: u64, window: Duration) -> Result<bool, RateLimitError> {
        let counter_key = Self::counter_key(key, window);
        let new_value = self.store.incr_by(&counter_key, n as i64, Some(window)).await?;
        Ok(new_value as u64 <= limit)
    }

    async fn remaining(&self, key: &str, limit: u64, window: Duration) -> Result<u64, RateLimitError> {
        let counter_key = Self::counter_key(key, window);
        let current = self.store.get_counter(&counter_key).await?.max(0) as u64;
        Ok(limit.saturating_sub(current))
    }
}

/// Wraps a fallible [`RateLimiter`] so store errors degrade to "allowed"
/// rather than denying traffic when the shared store is unavailable.
pub struct FailOpen<L> {
    inner: L,
}

impl<L: RateLimiter> FailOpen<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: RateLimiter> RateLimiter for FailOpen<L> {
    async fn allow(&self, key: &str, n: u64, limit: u64, window: Duration) -> Result<bool, RateLimitError> {
        match self.inner.allow(key, n, limit, window).await {
            Ok(allowed) => Ok(allowed),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key, error = %err, "rate limiter store failure, failing open");
                Ok(true)
            }
        }
    }

    async fn remaining(&self, key: &str, limit: u64, window: Duration) -> Result<u64, RateLimitError> {
        match self.inner.remaining(key, limit, window).await {
            Ok(remaining) => Ok(remaining),
            Err(_) => Ok(limit),
        }
    }
}
