//! Unified error taxonomy surfaced at the HTTP boundary.

use fleetgate_budget::BudgetError;
use fleetgate_cache::CacheError;
use fleetgate_ratelimit::RateLimitError;

/// Every way a dispatched request can fail, carrying enough structure for
/// `fleetgate-server` to map it onto an HTTP status, body, and headers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("model '{model}' is not permitted for this principal")]
    Permission { model: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("budget exceeded for {tier}: remaining {remaining}")]
    BudgetExceeded { tier: String, remaining: f64 },

    #[error("upstream returned status {status}")]
    Upstream { status: u16, message: String },

    #[error("upstream retryable failure exhausted: {0}")]
    UpstreamRetryable(String),

    #[error("no healthy instance available for model '{model}'")]
    CircuitOpen { model: String },

    #[error("request cancelled by client")]
    Cancelled,

    #[error("request deadline exceeded")]
    Timeout,

    #[error("service overloaded, shedding request")]
    Overloaded,

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl GatewayError {
    /// The `error.type` field of the OpenAI-compatible error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_error",
            Self::Permission { .. } => "permission_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::Upstream { .. } => "upstream_error",
            Self::UpstreamRetryable(_) => "upstream_error",
            Self::CircuitOpen { .. } => "upstream_error",
            Self::Cancelled => "invalid_request_error",
            Self::Timeout => "timeout_error",
            Self::Overloaded => "upstream_error",
            Self::Budget(_) => "budget_exceeded",
            Self::RateLimit(_) => "rate_limit_error",
            Self::Cache(_) => "upstream_error",
        }
    }

    /// The HTTP status this error maps onto.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Authentication(_) => 401,
            Self::Permission { .. } => 403,
            Self::InvalidRequest(_) => 400,
            Self::RateLimited { .. } => 429,
            Self::BudgetExceeded { .. } | Self::Budget(_) => 402,
            Self::Upstream { status, .. } => *status,
            Self::UpstreamRetryable(_) => 502,
            Self::CircuitOpen { .. } => 503,
            Self::Cancelled => 499,
            Self::Timeout => 504,
            Self::Overloaded => 503,
            Self::RateLimit(_) => 429,
            Self::Cache(_) => 500,
        }
    }

    /// `Retry-After` seconds, when applicable.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::CircuitOpen { .. } => Some(30),
            Self::Overloaded => Some(5),
            _ => None,
        }
    }

    /// Whether this failure should be excluded from circuit-breaker
    /// failure counting (client cancellation is not an upstream fault).
    pub fn counts_against_breaker(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
