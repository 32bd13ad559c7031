//! Keyed rate limiting for the gateway's admission path.
//!
//! Three interchangeable backends implement the same [`RateLimiter`]
//! contract: a shared-store sliding window, a shared-store fixed window,
//! and an in-memory token bucket used when the shared store is
//! unreachable. [`FailOpen`] wraps any of them so a store failure degrades
//! to allowing the call rather than denying it.

mod error;
mod mode;
mod shared;
mod token_bucket;

pub use error::RateLimitError;
pub use mode::RateLimiterMode;
pub use shared::{FailOpen, RateLimiter, SharedFixedWindowLimiter, SharedSlidingWindowLimiter};
pub use token_bucket::InMemoryTokenBucketLimiter;
