//! Durable usage queue and settlement worker (spec.md §4.9).
//!
//! The dispatch pipeline enqueues a [`UsageEvent`] per completed (or
//! failed mid-stream) request without waiting for settlement. A
//! [`SettlementWorker`] drains the queue in batches, writes each event's
//! durable Usage record, and folds its cost into the relevant
//! [`fleetgate_budget::BudgetService`] counters. Events that keep failing
//! are moved to a dead-letter list rather than blocking the batch.
//!
//! ```rust
//! use fleetgate_budget::BudgetService;
//! use fleetgate_core::InMemoryStore;
//! use fleetgate_usage::{SettlementWorker, UsageEvent};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = InMemoryStore::new();
//! let budget = Arc::new(BudgetService::with_defaults(store.clone()));
//! let worker = SettlementWorker::with_defaults(store, budget);
//!
//! worker.enqueue(&UsageEvent {
//!     request_id: "req-1".to_string(),
//!     team_id: None,
//!     user_id: None,
//!     key_id: "key-1".to_string(),
//!     model: "gpt-4".to_string(),
//!     instance_id: "gpt-4-east-1".to_string(),
//!     prompt_tokens: 120,
//!     completion_tokens: 48,
//!     cost: 0.01,
//!     latency_ms: 430,
//!     cache_hit: false,
//!     error: None,
//!     recorded_at_ms: 0,
//! }).await.unwrap();
//!
//! let drained = worker.run_once().await;
//! assert_eq!(drained, 1);
//! # }
//! ```

mod config;
mod event;
mod events;
mod worker;

pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use event::UsageEvent;
pub use events::WorkerEvent;
pub use worker::{SettlementWorker, DEAD_LETTER_KEY, QUEUE_KEY};
