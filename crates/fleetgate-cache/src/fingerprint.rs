//! Deterministic cache keys.
//!
//! `Fingerprint = hash(principal scope + normalized request body including
//! model, messages, temperature=0 only)`. Hashing is delegated to `blake3`
//! rather than hand-rolled, matching the hashing crate choice seen across
//! the example pack's LLM-facing services.

use std::fmt;

/// The `cache:response:<fingerprint>` key suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes the principal's cache scope together with the normalized
    /// request fields that fully determine the response: model name and
    /// the exact message/prompt content. Callers must have already checked
    /// [`is_cache_eligible`] before computing a fingerprint, since
    /// `temperature` and `stream` are deliberately not part of the hashed
    /// input (their eligibility gate is binary, not part of the key).
    pub fn compute(principal_scope: &str, model: &str, normalized_body: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(principal_scope.as_bytes());
        hasher.update(b"\0");
        hasher.update(model.as_bytes());
        hasher.update(b"\0");
        hasher.update(normalized_body.as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The shared-store key this fingerprint resolves to.
    pub fn store_key(&self) -> String {
        format!("cache:response:{}", self.0)
    }

    /// The shared-store key for this fingerprint's single-flight advisory lock.
    pub fn flight_key(&self) -> String {
        format!("cache:flight:{}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A response is only cacheable when it is deterministic and not streamed:
/// `temperature > 0` or `stream = true` skip the cache entirely (spec.md §3).
pub fn is_cache_eligible(temperature: f64, stream: bool) -> bool {
    temperature == 0.0 && !stream
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let a = Fingerprint::compute("key-1", "gpt-4", "{\"messages\":[]}");
        let b = Fingerprint::compute("key-1", "gpt-4", "{\"messages\":[]}");
        assert_eq!(a, b);
    }

    #[test]
    fn different_scope_produces_different_fingerprint() {
        let a = Fingerprint::compute("key-1", "gpt-4", "{\"messages\":[]}");
        let b = Fingerprint::compute("key-2", "gpt-4", "{\"messages\":[]}");
        assert_ne!(a, b);
    }

    #[test]
    fn eligibility_requires_zero_temperature_and_no_stream() {
        assert!(is_cache_eligible(0.0, false));
        assert!(!is_cache_eligible(0.1, false));
        assert!(!is_cache_eligible(0.0, true));
        assert!(!is_cache_eligible(0.7, true));
    }
}
