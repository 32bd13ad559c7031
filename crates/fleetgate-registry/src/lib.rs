//! Model registry for the FleetGate dispatch pipeline.
//!
//! Loads the configured set of upstream model instances, groups them by the
//! logical model name clients request, sorts each group by priority, and
//! exposes atomic hot-reload via `arc_swap::ArcSwap` so in-flight requests
//! keep working against the snapshot they resolved against.
//!
//! ## Example
//!
//! ```rust
//! use fleetgate_registry::{ModelInstanceSpec, ModelRegistry};
//!
//! let registry = ModelRegistry::new(vec![ModelInstanceSpec {
//!     id: "gpt4-primary".to_string(),
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
//! }]);
//!
//! let candidates = registry.resolve("gpt-4");
//! assert_eq!(candidates.len(), 1);
//! ```

mod group;
mod instance;
mod registry;

pub use group::LogicalModelGroup;
pub use instance::{ModelInstance, ModelInstanceSpec};
pub use registry::{ModelRegistry, RegistryStats};
