//! Bounded retry with exponential backoff and instance fallback for the
//! FleetGate dispatch pipeline.
//!
//! A [`RetryController`] drives a sequence of attempts against candidate
//! upstream instances. A failing attempt adds its instance to an
//! [`ExclusionSet`] so the caller's selection strategy picks a different
//! instance on the next try (fallback), sleeping for the policy's backoff
//! delay between attempts. [`classify::UpstreamErrorKind`] supplies the
//! retryable/non-retryable matrix from the gateway's error taxonomy.
//!
//! ## Example
//!
//! ```rust
//! use fleetgate_retry::{RetryController, RetryPolicy, UpstreamErrorKind};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let controller = RetryController::new(
//!     RetryPolicy::builder()
//!         .max_attempts(3)
//!         .initial_delay(Duration::from_millis(1))
//!         .build(),
//! );
//!
//! let result: Result<&str, UpstreamErrorKind> = controller
//!     .execute(UpstreamErrorKind::is_retryable, |excl, _attempt| async move {
//!         if excl.contains("inst-1") {
//!             Ok(("inst-2".to_string(), "ok"))
//!         } else {
//!             Err(("inst-1".to_string(), UpstreamErrorKind::Status(503)))
//!         }
//!     })
//!     .await;
//! assert_eq!(result, Ok("ok"));
//! # }
//! ```

mod classify;
mod controller;
mod events;
mod exclusion;
mod policy;

pub use classify::{is_retryable, UpstreamErrorKind};
pub use controller::RetryController;
pub use events::RetryEvent;
pub use exclusion::ExclusionSet;
pub use policy::{RetryPolicy, RetryPolicyBuilder};
