use crate::config::BreakerConfig;
use crate::events::BreakerEvent;
use fleetgate_core::EventListeners;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Lifecycle state of one instance's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Point-in-time view of one breaker's internals.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub slow_calls_in_window: usize,
    pub in_flight: usize,
    pub time_since_state_change: Duration,
}

struct Inner {
    consecutive_failures: usize,
    slow_outcomes: VecDeque<bool>,
    half_open_successes: usize,
    half_open_calls_issued: usize,
    last_state_change: Instant,
}

impl Inner {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            slow_outcomes: VecDeque::new(),
            half_open_successes: 0,
            half_open_calls_issued: 0,
            last_state_change: Instant::now(),
        }
    }

    fn slow_count(&self) -> usize {
        self.slow_outcomes.iter().filter(|s| **s).count()
    }

    fn push_outcome(&mut self, is_slow: bool, window_size: usize) {
        self.slow_outcomes.push_back(is_slow);
        while self.slow_outcomes.len() > window_size {
            self.slow_outcomes.pop_front();
        }
    }
}

/// A single instance's adaptive breaker.
///
/// State lives behind an atomic for lock-free reads (`state()`); the
/// mutable bookkeeping behind a short-lived `parking_lot::Mutex` so
/// `CanRequest`/`RecordSuccess`/`RecordFailure` never hold a lock across
/// an `.await`.
pub struct Breaker {
    instance_id: String,
    state_atomic: AtomicU8,
    in_flight: AtomicUsize,
    inner: Mutex<Inner>,
    config: BreakerConfig,
}

impl Breaker {
    pub(crate) fn new(instance_id: String, config: BreakerConfig) -> Self {
        Self {
            instance_id,
            state_atomic: AtomicU8::new(CircuitState::Closed as u8),
            in_flight: AtomicUsize::new(0),
            inner: Mutex::new(Inner::new()),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock();
        CircuitMetrics {
            state: self.state(),
            consecutive_failures: inner.consecutive_failures,
            slow_calls_in_window: inner.slow_count(),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            time_since_state_change: inner.last_state_change.elapsed(),
        }
    }

    /// Returns whether a call should be let through right now.
    ///
    /// In `Open`, returns `false` until `cooldown` has elapsed since the
    /// last state change, at which point it transitions to `HalfOpen` and
    /// permits exactly one probe. In `HalfOpen`, permits calls until
    /// `halfopen_probes` have been issued.
    pub fn can_request(&self, events: &EventListeners<BreakerEvent>) -> bool {
        let mut inner = self.inner.lock();
        match self.state() {
            CircuitState::Closed => {
                self.emit_permitted(&inner, events);
                true
            }
            CircuitState::Open => {
                if inner.last_state_change.elapsed() >= self.config.cooldown {
                    self.transition_locked(&mut inner, CircuitState::HalfOpen, events);
                    inner.half_open_calls_issued = 1;
                    self.emit_permitted(&inner, events);
                    true
                } else {
                    self.emit_rejected(events);
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls_issued < self.config.halfopen_probes {
                    inner.half_open_calls_issued += 1;
                    self.emit_permitted(&inner, events);
                    true
                } else {
                    self.emit_rejected(events);
                    false
                }
            }
        }
    }

    pub fn in_flight_start(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight_end(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency: Duration, events: &EventListeners<BreakerEvent>) {
        let is_slow = latency >= self.config.slow_call_duration;
        let mut inner = self.inner.lock();
        inner.push_outcome(is_slow, self.config.window_size);

        if is_slow {
            events.emit(&BreakerEvent::SlowCallDetected {
                instance_id: self.instance_id.clone(),
                timestamp: Instant::now(),
                duration: latency,
            });
            #[cfg(feature = "metrics")]
            counter!("breaker_slow_calls_total", "instance" => self.instance_id.clone())
                .increment(1);
        }

        match self.state() {
            CircuitState::HalfOpen => {
                inner.consecutive_failures = 0;
                inner.half_open_successes += 1;
                let state = self.state();
                events.emit(&BreakerEvent::SuccessRecorded {
                    instance_id: self.instance_id.clone(),
                    timestamp: Instant::now(),
                    state,
                });
                if inner.half_open_successes >= self.config.halfopen_successes_required {
                    self.transition_locked(&mut inner, CircuitState::Closed, events);
                }
            }
            state => {
                inner.consecutive_failures = 0;
                events.emit(&BreakerEvent::SuccessRecorded {
                    instance_id: self.instance_id.clone(),
                    timestamp: Instant::now(),
                    state,
                });
                if inner.slow_count() >= self.config.slow_threshold {
                    self.transition_locked(&mut inner, CircuitState::Open, events);
                }
            }
        }

        #[cfg(feature = "metrics")]
        counter!("breaker_calls_total", "instance" => self.instance_id.clone(), "outcome" => "success")
            .increment(1);
    }

    pub fn record_failure(&self, events: &EventListeners<BreakerEvent>) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        inner.push_outcome(false, self.config.window_size);

        let state = self.state();
        events.emit(&BreakerEvent::FailureRecorded {
            instance_id: self.instance_id.clone(),
            timestamp: Instant::now(),
            state,
        });

        #[cfg(feature = "metrics")]
        counter!("breaker_calls_total", "instance" => self.instance_id.clone(), "outcome" => "failure")
            .increment(1);

        match state {
            CircuitState::HalfOpen => {
                self.transition_locked(&mut inner, CircuitState::Open, events);
            }
            CircuitState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                self.transition_locked(&mut inner, CircuitState::Open, events);
            }
            _ => {}
        }
    }

    /// Forces `Open` immediately, regardless of accumulated state.
    pub fn record_timeout(&self, events: &EventListeners<BreakerEvent>) {
        let mut inner = self.inner.lock();
        events.emit(&BreakerEvent::Timeout {
            instance_id: self.instance_id.clone(),
            timestamp: Instant::now(),
        });
        self.transition_locked(&mut inner, CircuitState::Open, events);
    }

    pub fn reset(&self, events: &EventListeners<BreakerEvent>) {
        let mut inner = self.inner.lock();
        self.transition_locked(&mut inner, CircuitState::Closed, events);
    }

    fn emit_permitted(&self, inner: &Inner, events: &EventListeners<BreakerEvent>) {
        let _ = inner;
        events.emit(&BreakerEvent::CallPermitted {
            instance_id: self.instance_id.clone(),
            timestamp: Instant::now(),
            state: self.state(),
        });
    }

    fn emit_rejected(&self, events: &EventListeners<BreakerEvent>) {
        events.emit(&BreakerEvent::CallRejected {
            instance_id: self.instance_id.clone(),
            timestamp: Instant::now(),
        });
    }

    fn transition_locked(
        &self,
        inner: &mut Inner,
        to: CircuitState,
        events: &EventListeners<BreakerEvent>,
    ) {
        let from = self.state();
        if from == to {
            return;
        }

        events.emit(&BreakerEvent::StateTransition {
            instance_id: self.instance_id.clone(),
            timestamp: Instant::now(),
            from_state: from,
            to_state: to,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(instance = %self.instance_id, ?from, to = ?to, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        {
            let state_label = match to {
                CircuitState::Closed => "closed",
                CircuitState::Open => "open",
                CircuitState::HalfOpen => "half_open",
            };
            gauge!("breaker_state", "instance" => self.instance_id.clone(), "state" => state_label)
                .set(1.0);
        }

        self.state_atomic.store(to as u8, Ordering::Release);
        inner.consecutive_failures = 0;
        inner.slow_outcomes.clear();
        inner.half_open_successes = 0;
        inner.half_open_calls_issued = 0;
        inner.last_state_change = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> Breaker {
        Breaker::new(
            "inst-1".into(),
            BreakerConfig::builder()
                .failure_threshold(3)
                .slow_threshold(3)
                .cooldown(Duration::from_millis(20))
                .halfopen_probes(2)
                .halfopen_successes_required(2)
                .build(),
        )
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let b = breaker();
        let events = EventListeners::new();
        for _ in 0..3 {
            b.record_failure(&events);
        }
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let b = breaker();
        let events = EventListeners::new();
        b.record_failure(&events);
        b.record_failure(&events);
        b.record_success(Duration::from_millis(1), &events);
        b.record_failure(&events);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_on_slow_call_rate() {
        let b = breaker();
        let events = EventListeners::new();
        for _ in 0..3 {
            b.record_success(Duration::from_secs(5), &events);
        }
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn rejects_calls_while_open_then_probes_after_cooldown() {
        let b = breaker();
        let events = EventListeners::new();
        for _ in 0..3 {
            b.record_failure(&events);
        }
        assert!(!b.can_request(&events));

        std::thread::sleep(Duration::from_millis(30));
        assert!(b.can_request(&events));
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_required_successes() {
        let b = breaker();
        let events = EventListeners::new();
        for _ in 0..3 {
            b.record_failure(&events);
        }
        std::thread::sleep(Duration::from_millis(30));
        b.can_request(&events);

        b.record_success(Duration::from_millis(1), &events);
        assert_eq!(b.state(), CircuitState::HalfOpen);
        b.record_success(Duration::from_millis(1), &events);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_reopens_on_any_failure() {
        let b = breaker();
        let events = EventListeners::new();
        for _ in 0..3 {
            b.record_failure(&events);
        }
        std::thread::sleep(Duration::from_millis(30));
        b.can_request(&events);

        b.record_failure(&events);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn record_timeout_forces_open_from_closed() {
        let b = breaker();
        let events = EventListeners::new();
        b.record_timeout(&events);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn reset_returns_to_closed() {
        let b = breaker();
        let events = EventListeners::new();
        for _ in 0..3 {
            b.record_failure(&events);
        }
        b.reset(&events);
        assert_eq!(b.state(), CircuitState::Closed);
    }
}
