//! Per-instance adaptive circuit breaker for the gateway's dispatch pipeline.
//!
//! ## States
//! - **Closed**: normal operation, all requests pass through.
//! - **Open**: circuit is tripped, requests are rejected until `cooldown` elapses.
//! - **Half-Open**: a bounded number of probe requests are allowed through.
//!
//! Breakers are local to the replica that records against them: only
//! latency observations are shared across replicas, the circuit decision
//! itself is not.
//!
//! ## Example
//!
//! ```rust
//! use fleetgate_breaker::{BreakerConfig, Manager};
//! use std::time::Duration;
//!
//! let manager = Manager::new(
//!     BreakerConfig::builder()
//!         .failure_threshold(5)
//!         .cooldown(Duration::from_secs(30))
//!         .build(),
//! );
//!
//! if manager.can_request("gpt4-east-1") {
//!     manager.record_success("gpt4-east-1", Duration::from_millis(120));
//! }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection via the `metrics` crate
//! - `tracing`: enables state-transition logging via the `tracing` crate

mod circuit;
mod config;
mod events;
mod manager;

pub use circuit::{Breaker, CircuitMetrics, CircuitState};
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use events::BreakerEvent;
pub use manager::Manager;
