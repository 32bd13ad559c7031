//! The shared key-value store abstraction every replica reads and writes.
//!
//! Latency samples, rate-limit buckets, cached budget counters, the usage
//! queue, and the response cache all live behind this one trait so that a
//! single-process deployment can run on [`InMemoryStore`] and a fleet
//! deployment can swap in a Redis (or equivalent) implementation without
//! touching any caller. Every method maps onto one of the primitive
//! operations the gateway's store schema calls for: sorted sets for
//! time-windowed samples, hashes with TTL for cached aggregates, atomic
//! counters for budgets and rate limits, lists for the usage queue, and a
//! pub/sub channel for settlement events.
//!
//! Callers never hold a lock across an `.await` on this trait — every
//! implementation is expected to be internally short-lived per call.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use crate::error::StoreError;

/// A member of a sorted set, as used for latency samples and sliding-window
/// rate-limit buckets. `score` is typically a timestamp in nanoseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub score: f64,
    pub member: String,
}

/// Abstraction over the shared key-value store described in the gateway's
/// store schema (`latency:samples:<model>`, `budget:cache:<kind>:<id>`,
/// `ratelimit:<principal>:<scope>`, `usage:queue`, `cache:response:<fp>`, ...).
///
/// Implementations MUST be cheap to clone (an `Arc` internally) since every
/// component holds one.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Adds a member with the given score to a sorted set.
    async fn zadd(&self, key: &str, score: f64, member: String) -> Result<(), StoreError>;

    /// Removes members whose score falls in `[min, max]`.
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), StoreError>;

    /// Returns every member currently in the set, ordered by score ascending.
    async fn zrange_all(&self, key: &str) -> Result<Vec<ScoredMember>, StoreError>;

    /// Number of members currently in the set.
    async fn zcard(&self, key: &str) -> Result<usize, StoreError>;

    /// Trims the set down to `max_len` by dropping the lowest-scored members.
    async fn ztrim_to(&self, key: &str, max_len: usize) -> Result<(), StoreError>;

    /// Overwrites a hash with a TTL, used for cached aggregates.
    async fn hset_ex(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Reads a whole hash back; `None` if absent or expired.
    async fn hgetall(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError>;

    /// Atomically adds `delta` to a counter, creating it at `delta` if absent,
    /// and (re)setting `ttl` on the key when provided.
    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, StoreError>;

    /// Reads a counter's current value (0 if absent).
    async fn get_counter(&self, key: &str) -> Result<i64, StoreError>;

    /// Sets a string value with an expiry.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Reads a string value; `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Sets a value only if absent ("set if not exists"), used for the
    /// single-flight advisory lock (`cache:flight:<fingerprint>`). Returns
    /// `true` if this call won the race and set the value.
    async fn set_nx_ex(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError>;

    /// Deletes a key outright.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Pushes a value onto the left of a list (the usage queue).
    async fn lpush(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Pops up to `n` values from the right of a list.
    async fn rpop_batch(&self, key: &str, n: usize) -> Result<Vec<String>, StoreError>;

    /// Current list length.
    async fn llen(&self, key: &str) -> Result<usize, StoreError>;

    /// Publishes a message to a pub/sub channel (`events:usage`,
    /// `events:budget`). Best-effort: no subscribers is not an error.
    async fn publish(&self, channel: &str, message: String) -> Result<(), StoreError>;
}

/// A single-process, in-memory [`SharedStore`].
///
/// Used for tests and for a one-replica deployment where there is nothing to
/// coordinate across. TTLs are enforced lazily on read, matching the lazy
/// pruning behavior the distributed store variants use.
#[derive(Default)]
pub struct InMemoryStore {
    sorted_sets: Mutex<HashMap<String, Vec<ScoredMember>>>,
    hashes: Mutex<HashMap<String, (HashMap<String, String>, Option<Instant>)>>,
    counters: Mutex<HashMap<String, (i64, Option<Instant>)>>,
    strings: Mutex<HashMap<String, (String, Option<Instant>)>>,
    lists: Mutex<HashMap<String, std::collections::VecDeque<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn is_expired(deadline: &Option<Instant>) -> bool {
        deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn zadd(&self, key: &str, score: f64, member: String) -> Result<(), StoreError> {
        let mut sets = self.sorted_sets.lock();
        let set = sets.entry(key.to_string()).or_default();
        set.push(ScoredMember { score, member });
        set.sort_by(|a, b| a.score.total_cmp(&b.score));
        Ok(())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), StoreError> {
        let mut sets = self.sorted_sets.lock();
        if let Some(set) = sets.get_mut(key) {
            set.retain(|m| m.score < min || m.score > max);
        }
        Ok(())
    }

    async fn zrange_all(&self, key: &str) -> Result<Vec<ScoredMember>, StoreError> {
        let sets = self.sorted_sets.lock();
        Ok(sets.get(key).cloned().unwrap_or_default())
    }

    async fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        let sets = self.sorted_sets.lock();
        Ok(sets.get(key).map(|s| s.len()).unwrap_or(0))
    }

    async fn ztrim_to(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        let mut sets = self.sorted_sets.lock();
        if let Some(set) = sets.get_mut(key) {
            if set.len() > max_len {
                let drop_count = set.len() - max_len;
                set.drain(0..drop_count);
            }
        }
        Ok(())
    }

    async fn hset_ex(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut hashes = self.hashes.lock();
        hashes.insert(key.to_string(), (fields, Some(Instant::now() + ttl)));
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Option<HashMap<String, String>>, StoreError> {
        let mut hashes = self.hashes.lock();
        match hashes.get(key) {
            Some((_, deadline)) if Self::is_expired(deadline) => {
                hashes.remove(key);
                Ok(None)
            }
            Some((fields, _)) => Ok(Some(fields.clone())),
            None => Ok(None),
        }
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, StoreError> {
        let mut counters = self.counters.lock();
        let entry = counters
            .entry(key.to_string())
            .or_insert((0, ttl.map(|d| Instant::now() + d)));
        if Self::is_expired(&entry.1) {
            entry.0 = 0;
        }
        entry.0 += delta;
        if let Some(d) = ttl {
            entry.1 = Some(Instant::now() + d);
        }
        Ok(entry.0)
    }

    async fn get_counter(&self, key: &str) -> Result<i64, StoreError> {
        let mut counters = self.counters.lock();
        match counters.get(key) {
            Some((value, deadline)) if !Self::is_expired(deadline) => Ok(*value),
            Some(_) => {
                counters.remove(key);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut strings = self.strings.lock();
        strings.insert(key.to_string(), (value, Some(Instant::now() + ttl)));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut strings = self.strings.lock();
        match strings.get(key) {
            Some((_, deadline)) if Self::is_expired(deadline) => {
                strings.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set_nx_ex(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
        let mut strings = self.strings.lock();
        let occupied = match strings.get(key) {
            Some((_, deadline)) => !Self::is_expired(deadline),
            None => false,
        };
        if occupied {
            Ok(false)
        } else {
            strings.insert(key.to_string(), (value, Some(Instant::now() + ttl)));
            Ok(true)
        }
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.strings.lock().remove(key);
        self.hashes.lock().remove(key);
        self.sorted_sets.lock().remove(key);
        self.counters.lock().remove(key);
        self.lists.lock().remove(key);
        Ok(())
    }

    async fn lpush(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut lists = self.lists.lock();
        lists.entry(key.to_string()).or_default().push_front(value);
        Ok(())
    }

    async fn rpop_batch(&self, key: &str, n: usize) -> Result<Vec<String>, StoreError> {
        let mut lists = self.lists.lock();
        let Some(list) = lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let count = n.min(list.len());
        Ok((0..count).filter_map(|_| list.pop_back()).collect())
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let lists = self.lists.lock();
        Ok(lists.get(key).map(|l| l.len()).unwrap_or(0))
    }

    async fn publish(&self, _channel: &str, _message: String) -> Result<(), StoreError> {
        // No subscribers in the in-memory store; publishing is a no-op success.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zadd_and_zrange_return_in_score_order() {
        let store = InMemoryStore::new();
        store.zadd("k", 3.0, "c".into()).await.unwrap();
        store.zadd("k", 1.0, "a".into()).await.unwrap();
        store.zadd("k", 2.0, "b".into()).await.unwrap();

        let members = store.zrange_all("k").await.unwrap();
        let ordered: Vec<&str> = members.iter().map(|m| m.member.as_str()).collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn zremrangebyscore_prunes_old_samples() {
        let store = InMemoryStore::new();
        store.zadd("k", 1.0, "old".into()).await.unwrap();
        store.zadd("k", 100.0, "new".into()).await.unwrap();

        store.zremrangebyscore("k", 0.0, 50.0).await.unwrap();

        assert_eq!(store.zcard("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ztrim_to_drops_lowest_scored_first() {
        let store = InMemoryStore::new();
        for i in 0..10 {
            store.zadd("k", i as f64, format!("m{i}")).await.unwrap();
        }
        store.ztrim_to("k", 3).await.unwrap();
        let members = store.zrange_all("k").await.unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].member, "m7");
        assert_eq!(members[2].member, "m9");
    }

    #[tokio::test]
    async fn incr_by_accumulates_and_ttl_resets() {
        let store = InMemoryStore::new();
        assert_eq!(store.incr_by("c", 5, None).await.unwrap(), 5);
        assert_eq!(store.incr_by("c", 3, None).await.unwrap(), 8);
        assert_eq!(store.get_counter("c").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn incr_by_ttl_expiry_resets_to_zero_then_applies_delta() {
        let store = InMemoryStore::new();
        store
            .incr_by("c", 5, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        let value = store.incr_by("c", 2, Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn set_ex_and_get_roundtrip_then_expires() {
        let store = InMemoryStore::new();
        store
            .set_ex("s", "v".into(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(store.get("s").await.unwrap(), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("s").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_nx_ex_only_succeeds_once_until_expiry() {
        let store = InMemoryStore::new();
        assert!(store
            .set_nx_ex("lock", "a".into(), Duration::from_millis(20))
            .await
            .unwrap());
        assert!(!store
            .set_nx_ex("lock", "b".into(), Duration::from_millis(20))
            .await
            .unwrap());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store
            .set_nx_ex("lock", "c".into(), Duration::from_millis(20))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn list_push_pop_and_len() {
        let store = InMemoryStore::new();
        store.lpush("q", "1".into()).await.unwrap();
        store.lpush("q", "2".into()).await.unwrap();
        store.lpush("q", "3".into()).await.unwrap();
        assert_eq!(store.llen("q").await.unwrap(), 3);

        let popped = store.rpop_batch("q", 2).await.unwrap();
        assert_eq!(popped, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(store.llen("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn hset_ex_roundtrips_and_expires() {
        let store = InMemoryStore::new();
        let mut fields = HashMap::new();
        fields.insert("available".to_string(), "10".to_string());
        store
            .hset_ex("h", fields.clone(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(store.hgetall("h").await.unwrap(), Some(fields));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.hgetall("h").await.unwrap(), None);
    }
}
