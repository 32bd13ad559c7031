use fleetgate_core::GatewayEvent;
use std::time::Instant;

/// Events emitted by [`crate::ResponseCache`].
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Hit {
        fingerprint: String,
        timestamp: Instant,
    },
    Miss {
        fingerprint: String,
        timestamp: Instant,
    },
    Stored {
        fingerprint: String,
        timestamp: Instant,
    },
    SingleFlightLeader {
        fingerprint: String,
        timestamp: Instant,
    },
    SingleFlightWaiter {
        fingerprint: String,
        timestamp: Instant,
    },
}

impl GatewayEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "Hit",
            CacheEvent::Miss { .. } => "Miss",
            CacheEvent::Stored { .. } => "Stored",
            CacheEvent::SingleFlightLeader { .. } => "SingleFlightLeader",
            CacheEvent::SingleFlightWaiter { .. } => "SingleFlightWaiter",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Stored { timestamp, .. }
            | CacheEvent::SingleFlightLeader { timestamp, .. }
            | CacheEvent::SingleFlightWaiter { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            CacheEvent::Hit { fingerprint, .. }
            | CacheEvent::Miss { fingerprint, .. }
            | CacheEvent::Stored { fingerprint, .. }
            | CacheEvent::SingleFlightLeader { fingerprint, .. }
            | CacheEvent::SingleFlightWaiter { fingerprint, .. } => fingerprint,
        }
    }
}
