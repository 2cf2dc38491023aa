//! Background service starters.

use crate::sweeper::ExpirationSweeper;

use super::ArtifactBroker;

impl ArtifactBroker {
    /// Start the expiration sweeper background task
    ///
    /// The task stops when the broker shuts down.
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let sweeper = ExpirationSweeper::new(
            self.registry.clone(),
            self.workspaces.clone(),
            self.config.retention.sweep_interval,
            self.cancel.child_token(),
        );

        let handle = tokio::spawn(sweeper.run());

        tracing::info!(
            interval = ?self.config.retention.sweep_interval,
            "Expiration sweeper background task started"
        );

        handle
    }
}
