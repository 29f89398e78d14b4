pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::prediction::PredictionOrchestrator;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PredictionOrchestrator>,
    pub prometheus_enabled: bool,
}

impl AppState {
    pub fn new(orchestrator: Arc<PredictionOrchestrator>) -> Self {
        Self {
            orchestrator,
            prometheus_enabled: true,
        }
    }

    /// Turn the `/metrics` exposition on or off
    pub fn with_prometheus(mut self, enabled: bool) -> Self {
        self.prometheus_enabled = enabled;
        self
    }
}
