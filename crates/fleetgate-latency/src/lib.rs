//! Distributed, time-windowed latency tracking for the FleetGate dispatch
//! pipeline.
//!
//! Samples are appended to a [`fleetgate_core::SharedStore`]-backed sorted
//! set per logical model name, pruned to a rolling window on both write and
//! read, and reduced into [`LatencyStats`] (average/p50/p95/p99) and a
//! piecewise-linear [`health_score`] in `[0, 100]`.
//!
//! ## Example
//!
//! ```rust
//! use fleetgate_core::InMemoryStore;
//! use fleetgate_latency::LatencyTracker;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let tracker = LatencyTracker::with_defaults(InMemoryStore::new());
//! tracker.record("gpt-4", Duration::from_millis(120)).await;
//! let stats = tracker.get_stats("gpt-4").await;
//! assert_eq!(stats.sample_count, 1);
//! # }
//! ```

mod config;
mod health;
mod stats;
mod tracker;

pub use config::{LatencyConfig, LatencyConfigBuilder};
pub use health::health_score;
pub use stats::LatencyStats;
pub use tracker::LatencyTracker;
