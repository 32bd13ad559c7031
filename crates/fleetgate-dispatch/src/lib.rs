//! Request dispatch pipeline, principal resolution, and provider dialects
//! for the FleetGate LLM gateway (spec.md §4).
//!
//! [`GatewayContext`] wires together every collaborator crate once at
//! process startup; [`DispatchPipeline`] carries one inbound request through
//! authentication, permission checks, admission (rate limit + budget
//! precheck), cache lookup, instance selection, circuit-breaker and retry
//! handling, and usage settlement, returning either a buffered
//! [`DispatchOutcome::Unary`] response or a [`DispatchOutcome::Streaming`]
//! byte stream for `fleetgate-server` to forward.

mod context;
mod error;
mod pipeline;
mod principal;
mod provider;
mod shedding;

pub use context::{DispatchConfig, GatewayContext};
pub use error::GatewayError;
pub use pipeline::{DispatchOutcome, DispatchPipeline};
pub use principal::{credential_hash, ApiKeyRecord, Principal, PrincipalResolver, TeamPrincipal, UserPrincipal};
pub use provider::{ChatRequest, OpenAiDialect, ParsedUsage, ProviderDialect, UnaryResponse, UpstreamByteStream, WireRequest};
pub use shedding::{LoadShedder, SheddingConfig};
