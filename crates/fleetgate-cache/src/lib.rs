//! Opaque response cache for the FleetGate dispatch pipeline.
//!
//! Caches idempotent, unary responses keyed by a deterministic
//! [`Fingerprint`] of the principal scope and the normalized request body.
//! Eligibility is restricted to `temperature == 0` and non-streaming
//! requests ([`is_cache_eligible`]). A per-replica [`SingleFlight`] barrier
//! ensures concurrent identical requests only invoke the upstream once.
//!
//! ## Example
//!
//! ```rust
//! use fleetgate_cache::{CacheConfig, Fingerprint, ResponseCache, ResponseCacheEntry};
//! use fleetgate_core::InMemoryStore;
//!
//! # async fn example() {
//! let cache = ResponseCache::new(InMemoryStore::new(), CacheConfig::default());
//! let fingerprint = Fingerprint::compute("key-42", "gpt-4", "{\"messages\":[]}");
//!
//! let (entry, hit) = cache
//!     .get_or_populate(&fingerprint, || async {
//!         Ok(ResponseCacheEntry::new(200, vec![], b"response body".to_vec(), "inst-1".to_string()))
//!     })
//!     .await
//!     .unwrap();
//! assert!(!hit);
//! # }
//! ```

mod cache;
mod config;
mod entry;
mod error;
mod events;
mod fingerprint;
mod singleflight;

pub use cache::ResponseCache;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::ResponseCacheEntry;
pub use error::CacheError;
pub use events::CacheEvent;
pub use fingerprint::{is_cache_eligible, Fingerprint};
pub use singleflight::{FlightOutcome, SingleFlight};
