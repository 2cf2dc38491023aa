//! Application state for the API server

use crate::{ArtifactBroker, Config};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; both fields are cheap handles to shared data.
#[derive(Clone)]
pub struct AppState {
    /// The broker running jobs and serving artifacts
    pub broker: ArtifactBroker,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(broker: ArtifactBroker) -> Self {
        let config = broker.config.clone();
        Self { broker, config }
    }
}
