//! Pluggable instance-selection strategies for the FleetGate dispatch
//! pipeline (spec.md §4.6).
//!
//! A [`Router`] resolves the enabled candidate set for a logical model from
//! a [`fleetgate_registry::ModelRegistry`] and picks one according to a
//! [`RoutingStrategy`]: `Priority` (registry order), `WeightedRoundRobin`
//! (proportional expansion over the group's shared counter), `Random`, or
//! `LeastLatency` (queries [`fleetgate_latency::LatencyTracker`] per
//! candidate, falling back to the instance's local moving average, and
//! finally to a configurable cold-start ceiling).
//!
//! ## Example
//!
//! ```rust
//! use fleetgate_core::InMemoryStore;
//! use fleetgate_latency::LatencyTracker;
//! use fleetgate_registry::{ModelInstanceSpec, ModelRegistry};
//! use fleetgate_router::{Router, RouterConfig, RoutingStrategy};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = Arc::new(ModelRegistry::new(vec![ModelInstanceSpec {
//!     id: "gpt4-a".to_string(),
//!     logical_model: "gpt-4".to_string(),
//!     provider: "openai".to_string(),
//!     priority: 0,
//!     weight: 1,
//!     endpoint: "https://api.openai.com/v1".to_string(),
//!     credential: "sk-...".to_string(),
//!     enabled: true,
//!     tokens_per_minute: None,
//!     requests_per_minute: None,
//!     prompt_price_per_1k: 0.03,
//!     completion_price_per_1k: 0.06,
//! }]));
//! let latency = Arc::new(LatencyTracker::with_defaults(InMemoryStore::new()));
//! let router = Router::new(registry, latency, RouterConfig::default());
//!
//! let selected = router.select("gpt-4", RoutingStrategy::Priority, &[]).await;
//! assert!(selected.is_some());
//! # }
//! ```

mod config;
mod router;
mod strategy;

pub use config::{RouterConfig, RouterConfigBuilder};
pub use router::Router;
pub use strategy::RoutingStrategy;
