//! OpenAI-compatible HTTP surface for the FleetGate LLM gateway (spec.md §6).
//!
//! [`build_router`] wires the [`fleetgate_dispatch::DispatchPipeline`] into
//! an `axum` `Router`: `/v1/chat/completions`, `/v1/completions`,
//! `/v1/embeddings`, `/v1/models`, `/health`, `/ready`. Streaming responses
//! are forwarded as Server-Sent Events over the byte stream the pipeline
//! already produces; unary responses are buffered and relayed with the
//! provider-compatible headers attached.

mod error;
mod handlers;
mod state;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use fleetgate_dispatch::GatewayContext;

/// Builds the full gateway router over an already-constructed
/// [`GatewayContext`], matching the teacher's router-building style
/// (`examples/axum-resilient-kv-store`): routes registered flat, a shared
/// `State`, `tower-http`'s `TraceLayer` and `CorsLayer` applied uniformly.
pub fn build_router(ctx: Arc<GatewayContext>) -> Router {
    let state = AppState::new(ctx);

    Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/completions", post(handlers::completions))
        .route("/v1/embeddings", post(handlers::embeddings))
        .route("/v1/models", get(handlers::list_models))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
