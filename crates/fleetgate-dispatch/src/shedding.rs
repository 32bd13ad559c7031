//! Aggregate load signal and shedding decision.
//!
//! The dispatcher consults a fleet-wide health average before selecting an
//! instance: below a health threshold, with in-flight concurrency above a
//! ceiling, new non-critical requests are shed with 503. The ceiling itself
//! is adaptive: it grows on a healthy tick and halves on a shedding tick, the
//! additive-increase/multiplicative-decrease shape `fleetgate_core::aimd`
//! provides.

use std::sync::atomic::{AtomicUsize, Ordering};

use fleetgate_core::{AimdConfig, AimdController};

/// Threshold tuning for the shedding decision.
#[derive(Debug, Clone)]
pub struct SheddingConfig {
    /// Below this fleet-wide average health score, shedding is considered.
    pub health_floor: f64,
    pub aimd: AimdConfig,
}

impl Default for SheddingConfig {
    fn default() -> Self {
        Self {
            health_floor: 50.0,
            aimd: AimdConfig::default()
                .with_initial_limit(256)
                .with_min_limit(8)
                .with_max_limit(4096)
                .with_increase_by(8)
                .with_decrease_factor(0.5),
        }
    }
}

/// Tracks in-flight concurrency and an adaptive ceiling, local to this
/// replica ("shedding decisions are local").
pub struct LoadShedder {
    config: SheddingConfig,
    in_flight: AtomicUsize,
    ceiling: AimdController,
}

impl LoadShedder {
    pub fn new(config: SheddingConfig) -> Self {
        let ceiling = AimdController::new(config.aimd.clone());
        Self {
            config,
            in_flight: AtomicUsize::new(0),
            ceiling,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SheddingConfig::default())
    }

    pub fn request_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling.limit()
    }

    /// Whether a new request should be shed given the fleet's current
    /// average health score. A healthy tick nudges the ceiling up; a
    /// shedding tick halves it, so sustained overload converges to a lower
    /// admission rate rather than flapping.
    pub fn should_shed(&self, average_health_score: f64) -> bool {
        let overloaded =
            average_health_score < self.config.health_floor && self.in_flight() > self.ceiling();
        if overloaded {
            self.ceiling.on_failure();
        } else {
            self.ceiling.on_success();
        }
        overloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_fleet_never_sheds() {
        let shedder = LoadShedder::with_defaults();
        for _ in 0..10_000 {
            shedder.request_started();
        }
        assert!(!shedder.should_shed(95.0));
    }

    #[test]
    fn unhealthy_fleet_over_ceiling_sheds() {
        let config = SheddingConfig {
            health_floor: 50.0,
            aimd: AimdConfig::default()
                .with_initial_limit(4)
                .with_min_limit(1)
                .with_max_limit(16)
                .with_increase_by(1)
                .with_decrease_factor(0.5),
        };
        let shedder = LoadShedder::new(config);
        for _ in 0..10 {
            shedder.request_started();
        }
        assert!(shedder.should_shed(10.0));
    }

    #[test]
    fn ceiling_halves_on_sustained_shedding() {
        let config = SheddingConfig {
            health_floor: 50.0,
            aimd: AimdConfig::default()
                .with_initial_limit(100)
                .with_min_limit(1)
                .with_max_limit(1000)
                .with_increase_by(1)
                .with_decrease_factor(0.5),
        };
        let shedder = LoadShedder::new(config);
        for _ in 0..200 {
            shedder.request_started();
        }
        shedder.should_shed(10.0);
        assert_eq!(shedder.ceiling(), 50);
    }
}
