use fleetgate_retry::RetryPolicy;
use std::time::Duration;

/// Tuning for the [`crate::SettlementWorker`] batch-or-timeout loop
/// (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum events drained per iteration.
    pub batch_size: usize,
    /// Upper bound on how long one iteration waits for a full batch to
    /// accumulate before draining whatever is available.
    pub processing_interval: Duration,
    /// Backoff policy applied to an individual event's settlement retries
    /// before it is moved to the dead-letter list.
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            processing_interval: Duration::from_secs(30),
            retry: RetryPolicy::builder().max_attempts(3).build(),
        }
    }
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerConfigBuilder {
    batch_size: Option<usize>,
    processing_interval: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl WorkerConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }

    pub fn processing_interval(mut self, d: Duration) -> Self {
        self.processing_interval = Some(d);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn build(self) -> WorkerConfig {
        let defaults = WorkerConfig::default();
        WorkerConfig {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            processing_interval: self.processing_interval.unwrap_or(defaults.processing_interval),
            retry: self.retry.unwrap_or(defaults.retry),
        }
    }
}
