/// Which backend a configured rate limit runs against (spec.md §1 config
/// surface). All three implement the same [`crate::RateLimiter`] contract;
/// the mode only picks which one `GatewayContext` wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimiterMode {
    /// Shared-store sorted-set window. Accurate across replicas, the default.
    Sliding,
    /// Shared-store counter keyed by window bucket. Cheaper, coarser bursts
    /// at window boundaries.
    Fixed,
    /// In-process token bucket. No shared-store round trip, so windows are
    /// per-replica rather than fleet-wide.
    TokenBucket,
}

impl RateLimiterMode {
    /// Parses a configured mode name. Unknown names fall back to
    /// [`RateLimiterMode::Sliding`] with a warning.
    pub fn parse(name: &str) -> Self {
        match name {
            "sliding" => RateLimiterMode::Sliding,
            "fixed" => RateLimiterMode::Fixed,
            "token_bucket" | "token-bucket" => RateLimiterMode::TokenBucket,
            other => {
                #[cfg(feature = "tracing")]
                tracing::warn!(mode = other, "unknown rate limiter mode, falling back to sliding");
                #[cfg(not(feature = "tracing"))]
                let _ = other;
                RateLimiterMode::Sliding
            }
        }
    }
}

impl Default for RateLimiterMode {
    fn default() -> Self {
        RateLimiterMode::Sliding
    }
}
