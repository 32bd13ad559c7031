//! Events emitted by circuit breakers for observability.

use crate::circuit::CircuitState;
use fleetgate_core::GatewayEvent;
use std::time::{Duration, Instant};

/// Something a breaker observed about one instance.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    StateTransition {
        instance_id: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    CallPermitted {
        instance_id: String,
        timestamp: Instant,
        state: CircuitState,
    },
    CallRejected {
        instance_id: String,
        timestamp: Instant,
    },
    SuccessRecorded {
        instance_id: String,
        timestamp: Instant,
        state: CircuitState,
    },
    FailureRecorded {
        instance_id: String,
        timestamp: Instant,
        state: CircuitState,
    },
    SlowCallDetected {
        instance_id: String,
        timestamp: Instant,
        duration: Duration,
    },
    Timeout {
        instance_id: String,
        timestamp: Instant,
    },
}

impl GatewayEvent for BreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallPermitted { .. } => "call_permitted",
            BreakerEvent::CallRejected { .. } => "call_rejected",
            BreakerEvent::SuccessRecorded { .. } => "success_recorded",
            BreakerEvent::FailureRecorded { .. } => "failure_recorded",
            BreakerEvent::SlowCallDetected { .. } => "slow_call_detected",
            BreakerEvent::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BreakerEvent::StateTransition { timestamp, .. }
            | BreakerEvent::CallPermitted { timestamp, .. }
            | BreakerEvent::CallRejected { timestamp, .. }
            | BreakerEvent::SuccessRecorded { timestamp, .. }
            | BreakerEvent::FailureRecorded { timestamp, .. }
            | BreakerEvent::SlowCallDetected { timestamp, .. }
            | BreakerEvent::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { instance_id, .. }
            | BreakerEvent::CallPermitted { instance_id, .. }
            | BreakerEvent::CallRejected { instance_id, .. }
            | BreakerEvent::SuccessRecorded { instance_id, .. }
            | BreakerEvent::FailureRecorded { instance_id, .. }
            | BreakerEvent::SlowCallDetected { instance_id, .. }
            | BreakerEvent::Timeout { instance_id, .. } => instance_id,
        }
    }
}
