use std::fmt;

/// Errors surfaced by a rate limiter backend.
///
/// Shared-store backed limiters degrade to fail-open on this error rather
/// than propagate it — see [`crate::FailOpen`].
#[derive(Debug, Clone)]
pub enum RateLimitError {
    /// The backing shared store was unreachable or returned an error.
    StoreUnavailable(String),
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::StoreUnavailable(reason) => {
                write!(f, "rate limit store unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

impl From<fleetgate_core::StoreError> for RateLimitError {
    fn from(err: fleetgate_core::StoreError) -> Self {
        RateLimitError::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = RateLimitError::StoreUnavailable("timeout".into());
        assert_eq!(err.to_string(), "rate limit store unavailable: timeout");
    }
}
