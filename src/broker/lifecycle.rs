//! Startup and shutdown coordination.

use crate::error::Result;
use std::sync::atomic::Ordering;

use super::ArtifactBroker;

impl ArtifactBroker {
    /// Gracefully shut down the broker
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions
    /// 2. Cancels background tasks and signals the API server to stop
    /// 3. Removes every registered job and deletes its workspace
    ///
    /// Transfers still streaming keep their files until they finish; the
    /// last one deletes the workspace. Calling this more than once is
    /// harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        self.cancel.cancel();

        let drained = self.registry.drain();
        let count = drained.len();
        for workspace in drained {
            self.workspaces.release_logged(workspace).await;
        }

        tracing::info!(removed = count, "Graceful shutdown complete");
        Ok(())
    }
}
