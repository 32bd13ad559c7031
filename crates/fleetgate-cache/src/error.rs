//! Error type for the response cache.

use fleetgate_core::StoreError;
use thiserror::Error;

/// Failures the response cache can surface.
///
/// Per the gateway's propagation policy, callers degrade on
/// [`CacheError::Store`] (treat it as a miss) rather than failing the
/// request; it is surfaced here so callers can log it.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("cached entry was malformed: {0}")]
    Malformed(String),

    /// The producer closure passed to [`crate::ResponseCache::get_or_populate`]
    /// failed for a reason outside the cache's own store/serialization
    /// concerns (an upstream dispatch failure, say). Carried as a rendered
    /// message rather than a generic type parameter so the cache crate
    /// doesn't need to know about its callers' error types.
    #[error("cache producer failed: {0}")]
    Producer(String),
}
