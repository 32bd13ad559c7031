//! Per-replica single-flight barrier for the response cache.
//!
//! Guarantees that at most one upstream call is in flight for a given
//! fingerprint on this replica at a time (spec.md §8: "For all fingerprint
//! F, while a single-flight is in progress, no concurrent upstream call for
//! F exists on the same replica"). This is intentionally in-process only —
//! spec.md §5 scopes single-flight to "on a given replica", unlike latency
//! and budget state which cross replicas through the shared store.
//!
//! Grounded in the teacher's leader/waiter coalescing shape
//! (`tower-resilience-coalesce`'s `InFlight`/broadcast-channel pattern),
//! adapted here to a concrete `(Fingerprint, ResponseCacheEntry)` pair
//! instead of a generic `Service`.

use crate::entry::ResponseCacheEntry;
use crate::error::CacheError;
use crate::fingerprint::Fingerprint;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Clone)]
enum Outcome {
    Entry(ResponseCacheEntry),
    Failed,
}

/// Tracks in-flight fingerprints for one replica.
pub struct SingleFlight {
    in_flight: Mutex<HashMap<String, broadcast::Sender<Outcome>>>,
    wait_timeout: Duration,
}

/// Result of joining a single-flight barrier.
pub enum FlightOutcome {
    /// This caller is the leader and must produce the result.
    Leader(Lease),
    /// The entry produced by the leader (or a wait timeout/failure).
    Followed(Option<ResponseCacheEntry>),
}

/// Held by the leader; completing or dropping it releases waiters.
pub struct Lease<'a> {
    flight: &'a SingleFlight,
    fingerprint: String,
    done: bool,
}

impl<'a> Lease<'a> {
    pub fn complete(mut self, entry: Option<ResponseCacheEntry>) {
        self.done = true;
        self.flight.complete(&self.fingerprint, entry);
    }
}

impl<'a> Drop for Lease<'a> {
    fn drop(&mut self) {
        if !self.done {
            self.flight.complete(&self.fingerprint, None);
        }
    }
}

impl SingleFlight {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            wait_timeout,
        }
    }

    /// Joins (or starts) the single-flight barrier for `fingerprint`.
    pub async fn join(&self, fingerprint: &Fingerprint) -> FlightOutcome {
        let receiver = {
            let mut in_flight = self.in_flight.lock();
            if let Some(sender) = in_flight.get(fingerprint.as_str()) {
                Some(sender.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(1);
                in_flight.insert(fingerprint.as_str().to_string(), tx);
                None
            }
        };

        match receiver {
            None => FlightOutcome::Leader(Lease {
                flight: self,
                fingerprint: fingerprint.as_str().to_string(),
                done: false,
            }),
            Some(mut rx) => {
                let outcome = tokio::time::timeout(self.wait_timeout, rx.recv()).await;
                match outcome {
                    Ok(Ok(Outcome::Entry(entry))) => FlightOutcome::Followed(Some(entry)),
                    Ok(Ok(Outcome::Failed)) | Ok(Err(_)) | Err(_) => FlightOutcome::Followed(None),
                }
            }
        }
    }

    /// Runs `produce` under the single-flight barrier, returning whatever
    /// `produce` returns along with whether this call was the leader.
    pub async fn get_or_run<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        produce: F,
    ) -> Result<(ResponseCacheEntry, bool), CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResponseCacheEntry, CacheError>>,
    {
        match self.join(fingerprint).await {
            FlightOutcome::Leader(lease) => match produce().await {
                Ok(entry) => {
                    lease.complete(Some(entry.clone()));
                    Ok((entry, true))
                }
                Err(err) => {
                    lease.complete(None);
                    Err(err)
                }
            },
            FlightOutcome::Followed(Some(entry)) => Ok((entry, false)),
            FlightOutcome::Followed(None) => Err(CacheError::Malformed(
                "single-flight leader failed or wait timed out".into(),
            )),
        }
    }

    fn complete(&self, fingerprint: &str, entry: Option<ResponseCacheEntry>) {
        if let Some(sender) = self.in_flight.lock().remove(fingerprint) {
            let outcome = match entry {
                Some(entry) => Outcome::Entry(entry),
                None => Outcome::Failed,
            };
            let _ = sender.send(outcome);
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::compute(s, "gpt-4", "{}")
    }

    #[tokio::test]
    async fn only_one_upstream_call_for_concurrent_identical_fingerprints() {
        let flight = Arc::new(SingleFlight::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let fingerprint = fp("scope-1");

        let mut handles = Vec::new();
        for _ in 0..5 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            let fingerprint = fingerprint.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .get_or_run(&fingerprint, || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(ResponseCacheEntry::new(200, vec![], b"body".to_vec(), "inst-1".to_string()))
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            let (entry, _was_leader) = handle.await.unwrap().unwrap();
            assert_eq!(entry.body, b"body".to_vec());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_fingerprints_do_not_share_a_flight() {
        let flight = SingleFlight::default();
        let a = flight
            .get_or_run(&fp("a"), || async {
                Ok(ResponseCacheEntry::new(200, vec![], b"a".to_vec(), "inst-1".to_string()))
            })
            .await
            .unwrap();
        let b = flight
            .get_or_run(&fp("b"), || async {
                Ok(ResponseCacheEntry::new(200, vec![], b"b".to_vec(), "inst-1".to_string()))
            })
            .await
            .unwrap();
        assert!(a.1 && b.1);
        assert_eq!(a.0.body, b"a".to_vec());
        assert_eq!(b.0.body, b"b".to_vec());
    }

    #[tokio::test]
    async fn leader_failure_surfaces_error_to_waiters() {
        let flight = Arc::new(SingleFlight::default());
        let fingerprint = fp("scope-err");

        let flight2 = Arc::clone(&flight);
        let fp2 = fingerprint.clone();
        let leader = tokio::spawn(async move {
            flight2
                .get_or_run(&fp2, || async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err(CacheError::Malformed("upstream failed".into()))
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        let waiter = flight.get_or_run(&fingerprint, || async {
            unreachable!("waiter must not become leader")
        });

        let (leader_result, waiter_result) = tokio::join!(leader, waiter);
        assert!(leader_result.unwrap().is_err());
        assert!(waiter_result.is_err());
    }
}
