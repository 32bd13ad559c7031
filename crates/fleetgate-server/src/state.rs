use std::sync::Arc;

use fleetgate_dispatch::{DispatchPipeline, GatewayContext};

/// Shared axum state: one handle to the [`DispatchPipeline`], cheap to
/// clone per-request (it only clones an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub pipeline: DispatchPipeline,
}

impl AppState {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self {
            pipeline: DispatchPipeline::new(ctx),
        }
    }
}
