use crate::circuit::{Breaker, CircuitState};
use crate::config::BreakerConfig;
use crate::events::BreakerEvent;
use fleetgate_core::EventListeners;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Lazily creates and owns one [`Breaker`] per instance identifier.
///
/// Breakers are per-replica: the manager holds no shared-store handle and
/// makes no attempt to coordinate with other replicas, matching the
/// invariant that circuit decisions are local while latency observations
/// are shared.
pub struct Manager {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<Breaker>>>,
    events: EventListeners<BreakerEvent>,
}

impl Manager {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
            events: EventListeners::new(),
        }
    }

    pub fn with_event_listener<L>(mut self, listener: L) -> Self
    where
        L: fleetgate_core::EventListener<BreakerEvent> + 'static,
    {
        self.events.add(listener);
        self
    }

    /// Returns the breaker for `instance_id`, creating it on first access.
    pub fn breaker(&self, instance_id: &str) -> Arc<Breaker> {
        if let Some(existing) = self.breakers.read().get(instance_id) {
            return Arc::clone(existing);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(
            breakers
                .entry(instance_id.to_string())
                .or_insert_with(|| Arc::new(Breaker::new(instance_id.to_string(), self.config.clone()))),
        )
    }

    pub fn can_request(&self, instance_id: &str) -> bool {
        self.breaker(instance_id).can_request(&self.events)
    }

    pub fn record_success(&self, instance_id: &str, latency: std::time::Duration) {
        self.breaker(instance_id).record_success(latency, &self.events);
    }

    pub fn record_failure(&self, instance_id: &str) {
        self.breaker(instance_id).record_failure(&self.events);
    }

    pub fn record_timeout(&self, instance_id: &str) {
        self.breaker(instance_id).record_timeout(&self.events);
    }

    pub fn in_flight_start(&self, instance_id: &str) {
        self.breaker(instance_id).in_flight_start();
    }

    pub fn in_flight_end(&self, instance_id: &str) {
        self.breaker(instance_id).in_flight_end();
    }

    pub fn state(&self, instance_id: &str) -> CircuitState {
        self.breaker(instance_id).state()
    }

    /// Resets one instance's breaker to `Closed`.
    pub fn reset(&self, instance_id: &str) {
        if let Some(breaker) = self.breakers.read().get(instance_id) {
            breaker.reset(&self.events);
        }
    }

    /// Resets every known breaker to `Closed`.
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset(&self.events);
        }
    }

    pub fn known_instances(&self) -> Vec<String> {
        self.breakers.read().keys().cloned().collect()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
