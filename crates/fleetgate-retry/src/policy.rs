use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff with optional jitter.
///
/// `delay(n) = min(initial * multiplier^(n-1), max_delay)`, then if jitter
/// is enabled a uniform `[0, 0.3 * delay)` amount is added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Delay to wait before retry attempt `n` (1-indexed: `n=1` is the delay
    /// before the first retry, following the initial attempt).
    pub fn delay_for(&self, n: usize) -> Duration {
        let exponent = n.saturating_sub(1) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let base = base.min(self.max_delay.as_secs_f64()).max(0.0);

        let delay = if self.jitter {
            let jitter_span = base * 0.3;
            base + rand::thread_rng().gen_range(0.0..jitter_span.max(f64::MIN_POSITIVE))
        } else {
            base
        };

        Duration::from_secs_f64(delay)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<bool>,
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = Some(n);
        self
    }

    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.initial_delay = Some(d);
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    pub fn multiplier(mut self, m: f64) -> Self {
        self.multiplier = Some(m);
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = Some(enabled);
        self
    }

    pub fn build(self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
            initial_delay: self.initial_delay.unwrap_or(default.initial_delay),
            max_delay: self.max_delay.unwrap_or(default.max_delay),
            multiplier: self.multiplier.unwrap_or(default.multiplier),
            jitter: self.jitter.unwrap_or(default.jitter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.multiplier, 2.0);
        assert!(policy.jitter);
    }

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(1))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(30))
            .jitter(false)
            .build();

        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(1))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(5))
            .jitter(false)
            .build();

        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn jitter_adds_at_most_thirty_percent() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(10))
            .multiplier(1.0)
            .max_delay(Duration::from_secs(10))
            .jitter(true)
            .build();

        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay.as_secs_f64() >= 10.0);
            assert!(delay.as_secs_f64() < 13.0);
        }
    }
}
