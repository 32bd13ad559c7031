use fleetgate_core::GatewayEvent;
use std::time::Instant;

/// Events emitted by [`crate::SettlementWorker`], independent of the
/// `events:usage` / `events:budget` pub/sub channels it also publishes to.
/// These are for in-process observers (tracing, metrics) of the worker's
/// own health; the pub/sub channels are for other replicas/subsystems.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Settled { request_id: String, timestamp: Instant },
    RetryScheduled { request_id: String, attempt: usize, timestamp: Instant },
    DeadLettered { request_id: String, timestamp: Instant },
}

impl GatewayEvent for WorkerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WorkerEvent::Settled { .. } => "Settled",
            WorkerEvent::RetryScheduled { .. } => "RetryScheduled",
            WorkerEvent::DeadLettered { .. } => "DeadLettered",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            WorkerEvent::Settled { timestamp, .. }
            | WorkerEvent::RetryScheduled { timestamp, .. }
            | WorkerEvent::DeadLettered { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            WorkerEvent::Settled { request_id, .. }
            | WorkerEvent::RetryScheduled { request_id, .. }
            | WorkerEvent::DeadLettered { request_id, .. } => request_id,
        }
    }
}
