//! Budget tracking and enforcement for the gateway's spend limits
//! (spec.md §4.4).
//!
//! Limits are configured per team, user, or API key and checked in that
//! precedence order before a request is dispatched. Settlement — applying
//! an upstream call's actual cost once it is known — flows through
//! [`BudgetService::apply_usage`], typically from the usage settlement
//! worker.
//!
//! ```rust
//! use fleetgate_budget::{BudgetService, EntityKind, Period};
//! use fleetgate_core::InMemoryStore;
//!
//! # async fn example() {
//! let service = BudgetService::with_defaults(InMemoryStore::new());
//! service.configure_limit(EntityKind::Key, "key-123", Some(100.0), Period::Monthly).await.unwrap();
//!
//! let decision = service.check_budget(None, None, "key-123", 5.0).await;
//! assert!(decision.is_allowed());
//! # }
//! ```

mod config;
mod cost;
mod decision;
mod error;
mod service;
mod types;

pub use config::{BudgetConfig, BudgetConfigBuilder};
pub use cost::{estimate_cost, estimate_tokens};
pub use decision::BudgetDecision;
pub use error::BudgetError;
pub use service::BudgetService;
pub use types::{BudgetCounter, EntityKind, Period};
