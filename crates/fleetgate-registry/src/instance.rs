use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Configuration-file shape for one upstream endpoint; deserialized from
/// `config.toml` and turned into a live [`ModelInstance`] by
/// [`crate::ModelRegistry`] at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInstanceSpec {
    pub id: String,
    pub logical_model: String,
    pub provider: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_weight")]
    pub weight: u32,
    pub endpoint: String,
    pub credential: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tokens_per_minute: Option<u64>,
    #[serde(default)]
    pub requests_per_minute: Option<u64>,
    #[serde(default)]
    pub prompt_price_per_1k: f64,
    #[serde(default)]
    pub completion_price_per_1k: f64,
}

/// A live, addressable upstream endpoint for one provider/model pair
/// (spec.md §3 "Model Instance").
///
/// Cheap to clone: identity fields are plain values, and the local latency
/// counter is an `Arc<AtomicU64>` shared by every clone of "the same"
/// instance, so a routing strategy holding a snapshot from `resolve()` and
/// the dispatch pipeline recording an outcome are updating the same cell.
#[derive(Clone)]
pub struct ModelInstance {
    pub id: String,
    pub logical_model: String,
    pub provider: String,
    pub priority: u32,
    pub weight: u32,
    pub endpoint: String,
    pub enabled: bool,
    pub tokens_per_minute: Option<u64>,
    pub requests_per_minute: Option<u64>,
    pub prompt_price_per_1k: f64,
    pub completion_price_per_1k: f64,
    credential: Arc<str>,
    local_latency_bits: Arc<AtomicU64>,
}

impl ModelInstance {
    pub fn from_spec(spec: ModelInstanceSpec) -> Self {
        Self {
            id: spec.id,
            logical_model: spec.logical_model,
            provider: spec.provider,
            priority: spec.priority,
            weight: spec.weight.max(1),
            endpoint: spec.endpoint,
            enabled: spec.enabled,
            tokens_per_minute: spec.tokens_per_minute,
            requests_per_minute: spec.requests_per_minute,
            prompt_price_per_1k: spec.prompt_price_per_1k,
            completion_price_per_1k: spec.completion_price_per_1k,
            credential: Arc::from(spec.credential.as_str()),
            local_latency_bits: Arc::new(AtomicU64::new(0)),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(id: &str, logical_model: &str, priority: u32, weight: u32) -> Self {
        Self::from_spec(ModelInstanceSpec {
            id: id.to_string(),
            logical_model: logical_model.to_string(),
            provider: "test".to_string(),
            priority,
            weight,
            endpoint: "https://example.invalid".to_string(),
            credential: "secret".to_string(),
            enabled: true,
            tokens_per_minute: None,
            requests_per_minute: None,
            prompt_price_per_1k: 0.0,
            completion_price_per_1k: 0.0,
        })
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// The local per-instance moving average (spec.md §3), used as a
    /// routing fallback when the distributed latency tracker has no
    /// samples for this instance's model, or its store is unavailable.
    /// `None` before the first observation.
    pub fn local_average_latency_ms(&self) -> Option<f64> {
        let bits = self.local_latency_bits.load(Ordering::Relaxed);
        if bits == 0 {
            None
        } else {
            Some(f64::from_bits(bits))
        }
    }

    /// Folds a newly observed latency into the local moving average.
    pub fn record_latency(&self, latency_ms: f64, alpha: f64) {
        let mut current = self.local_latency_bits.load(Ordering::Relaxed);
        loop {
            let updated = if current == 0 {
                latency_ms
            } else {
                let old = f64::from_bits(current);
                old + alpha * (latency_ms - old)
            };
            match self.local_latency_bits.compare_exchange_weak(
                current,
                updated.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("id", &self.id)
            .field("logical_model", &self.logical_model)
            .field("provider", &self.provider)
            .field("priority", &self.priority)
            .field("weight", &self.weight)
            .field("endpoint", &self.endpoint)
            .field("enabled", &self.enabled)
            .field("credential", &"<redacted>")
            .finish()
    }
}
