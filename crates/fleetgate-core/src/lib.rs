//! Core infrastructure shared by every FleetGate gateway crate.
//!
//! This crate provides the primitives the rest of the workspace builds on:
//! - [`events`]: the event/listener system used for observability hooks
//! - [`error`]: the coarse [`error::StoreError`] shared store failures surface as
//! - [`store`]: the [`store::SharedStore`] trait and its in-memory reference impl
//! - [`aimd`]: a generic additive-increase/multiplicative-decrease limit, used
//!   by the dispatcher as the fleet-wide concurrency ceiling for shedding
//! - [`session`]: [`session::SessionState`], the one JSON-blob record in the
//!   store schema (`session:realtime:<id>`)

pub mod aimd;
pub mod error;
pub mod events;
pub mod session;
pub mod store;

pub use aimd::{AimdConfig, AimdController};
pub use error::StoreError;
pub use events::{EventListener, EventListeners, FnListener, GatewayEvent};
pub use session::SessionState;
pub use store::{InMemoryStore, ScoredMember, SharedStore};
