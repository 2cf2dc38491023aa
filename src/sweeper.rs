//! Background expiration sweeper
//!
//! Backstop for jobs whose artifacts are never collected: on every tick the
//! sweeper removes expired records from the [`ArtifactRegistry`] and deletes
//! the workspaces it was handed, outside the registry lock.
//!
//! # Example
//!
//! ```no_run
//! use artifact_broker::registry::ArtifactRegistry;
//! use artifact_broker::sweeper::ExpirationSweeper;
//! use artifact_broker::workspace::WorkspaceManager;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let cancel = CancellationToken::new();
//! let sweeper = ExpirationSweeper::new(
//!     ArtifactRegistry::new(),
//!     WorkspaceManager::new("./work", "job"),
//!     Duration::from_secs(60),
//!     cancel.clone(),
//! );
//!
//! let handle = tokio::spawn(sweeper.run());
//! cancel.cancel();
//! handle.await.ok();
//! # }
//! ```

use crate::registry::ArtifactRegistry;
use crate::workspace::WorkspaceManager;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodic task evicting expired artifacts
pub struct ExpirationSweeper {
    registry: ArtifactRegistry,
    workspaces: WorkspaceManager,
    interval: Duration,
    cancel: CancellationToken,
}

impl ExpirationSweeper {
    /// Creates a new sweeper
    ///
    /// # Parameters
    /// - `registry`: registry to sweep
    /// - `workspaces`: used to delete reclaimed workspaces
    /// - `interval`: time between sweeps
    /// - `cancel`: stops the loop when cancelled
    pub fn new(
        registry: ArtifactRegistry,
        workspaces: WorkspaceManager,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            workspaces,
            interval,
            cancel,
        }
    }

    /// Run until the cancellation token fires
    pub async fn run(self) {
        info!(interval = ?self.interval, "expiration sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        info!("expiration sweeper stopped");
    }

    /// Sweep once and return how many workspaces were reclaimed
    pub async fn sweep_once(&self) -> usize {
        let reclaimed = self.registry.sweep(Instant::now());
        let count = reclaimed.len();

        for workspace in reclaimed {
            debug!(workspace = %workspace.path().display(), "reclaiming expired workspace");
            self.workspaces.release_logged(workspace).await;
        }

        if count > 0 {
            info!(count, live_jobs = self.registry.len(), "swept expired jobs");
        }
        count
    }
}
