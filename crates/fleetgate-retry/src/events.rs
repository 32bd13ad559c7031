use fleetgate_core::GatewayEvent;
use std::time::{Duration, Instant};

/// Events emitted by [`crate::RetryController`].
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt (initial or retry) is about to be dispatched to an instance.
    Attempt {
        instance_id: String,
        timestamp: Instant,
        attempt: usize,
    },
    /// An attempt failed with a retryable error and another attempt will follow.
    Retry {
        instance_id: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// An error was not retryable and the chain stopped immediately.
    IgnoredError {
        instance_id: String,
        timestamp: Instant,
    },
    /// The operation succeeded, possibly after retries.
    Success {
        instance_id: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// All attempts were exhausted without success.
    Exhausted {
        timestamp: Instant,
        attempts: usize,
    },
}

impl GatewayEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Attempt { .. } => "Attempt",
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::IgnoredError { .. } => "IgnoredError",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Exhausted { .. } => "Exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Attempt { timestamp, .. }
            | RetryEvent::Retry { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        "retry"
    }
}
