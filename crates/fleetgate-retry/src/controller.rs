use crate::events::RetryEvent;
use crate::exclusion::ExclusionSet;
use crate::policy::RetryPolicy;
use fleetgate_core::EventListeners;
use std::future::Future;
use std::time::Instant;

/// Drives bounded-retry execution across candidate instances.
///
/// `attempt` is called once per try; it receives the exclusion set built up
/// from prior failures (so it can hand that to a routing strategy) and the
/// 1-indexed attempt number, and returns either the instance that served the
/// request with its result, or the instance that failed with its error.
pub struct RetryController {
    policy: RetryPolicy,
    events: EventListeners<RetryEvent>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            events: EventListeners::new(),
        }
    }

    pub fn with_event_listener<L>(mut self, listener: L) -> Self
    where
        L: fleetgate_core::EventListener<RetryEvent> + 'static,
    {
        self.events.add(listener);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `attempt` until it succeeds, an error is classified
    /// non-retryable, or `max_attempts` is reached. On a retryable failure
    /// the failing instance is added to the exclusion set passed to the next
    /// attempt, and the controller sleeps for the policy's backoff delay.
    pub async fn execute<T, E, Attempt, Fut>(
        &self,
        is_retryable: impl Fn(&E) -> bool,
        mut attempt: Attempt,
    ) -> Result<T, E>
    where
        Attempt: FnMut(&ExclusionSet, usize) -> Fut,
        Fut: Future<Output = Result<(String, T), (String, E)>>,
    {
        let mut exclusions = ExclusionSet::new();
        let mut last_error = None;

        for n in 1..=self.policy.max_attempts {
            self.events.emit(&RetryEvent::Attempt {
                instance_id: String::new(),
                timestamp: Instant::now(),
                attempt: n,
            });

            match attempt(&exclusions, n).await {
                Ok((instance_id, value)) => {
                    self.events.emit(&RetryEvent::Success {
                        instance_id,
                        timestamp: Instant::now(),
                        attempts: n,
                    });
                    return Ok(value);
                }
                Err((instance_id, error)) => {
                    if !is_retryable(&error) {
                        self.events.emit(&RetryEvent::IgnoredError {
                            instance_id,
                            timestamp: Instant::now(),
                        });
                        return Err(error);
                    }

                    exclusions.exclude(instance_id.clone());

                    if n >= self.policy.max_attempts {
                        last_error = Some(error);
                        break;
                    }

                    let delay = self.policy.delay_for(n);
                    self.events.emit(&RetryEvent::Retry {
                        instance_id,
                        timestamp: Instant::now(),
                        attempt: n,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                    last_error = Some(error);
                }
            }
        }

        self.events.emit(&RetryEvent::Exhausted {
            timestamp: Instant::now(),
            attempts: self.policy.max_attempts,
        });
        Err(last_error.expect("loop always records an error before exhausting"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .jitter(false)
            .build()
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_retry() {
        let controller = RetryController::new(fast_policy(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);

        let result: Result<&str, &str> = controller
            .execute(|_: &&str| true, move |_excl, _n| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(("inst-1".to_string(), "ok"))
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_and_excludes_failing_instance() {
        let controller = RetryController::new(fast_policy(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let seen_exclusions = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen_exclusions);

        let result = controller
            .execute(
                |_: &&str| true,
                move |excl, n| {
                    let calls = Arc::clone(&calls2);
                    let seen = Arc::clone(&seen2);
                    seen.lock().unwrap().push(excl.len());
                    async move {
                        let count = calls.fetch_add(1, Ordering::SeqCst);
                        if n < 2 {
                            Err(("inst-1".to_string(), "transient"))
                        } else {
                            let _ = count;
                            Ok(("inst-2".to_string(), "ok"))
                        }
                    }
                },
            )
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*seen_exclusions.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let controller = RetryController::new(fast_policy(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);

        let result: Result<&str, &str> = controller
            .execute(|_: &&str| false, move |_excl, _n| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(("inst-1".to_string(), "auth failure"))
                }
            })
            .await;

        assert_eq!(result, Err("auth failure"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let controller = RetryController::new(fast_policy(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);

        let result: Result<&str, &str> = controller
            .execute(|_: &&str| true, move |_excl, _n| {
                let calls = Arc::clone(&calls2);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(("inst-1".to_string(), "still failing"))
                }
            })
            .await;

        assert_eq!(result, Err("still failing"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
