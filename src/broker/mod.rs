//! Job broker split into focused submodules.
//!
//! The `ArtifactBroker` struct and its methods are organized by concern:
//! - [`submit`] - Job submission: workspace, external tool, registration
//! - [`dispatch`] - Artifact downloads with one-shot serve tracking
//! - [`lifecycle`] - Startup and shutdown coordination
//! - [`services`] - Background service starters

mod dispatch;
mod lifecycle;
mod services;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatch::{ArtifactDownload, ArtifactStream};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::invoker::{CliTransformer, Transformer};
use crate::registry::ArtifactRegistry;
use crate::workspace::WorkspaceManager;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Main broker instance
///
/// Owns the artifact registry, the workspace root and the transformation
/// step. Cloning is cheap: every clone shares the same state, so the broker
/// can be handed to HTTP handlers and background tasks alike.
#[derive(Clone)]
pub struct ArtifactBroker {
    /// Configuration (wrapped in Arc for sharing)
    pub config: Arc<Config>,
    /// Source of truth for downloadable artifacts
    pub(crate) registry: ArtifactRegistry,
    /// Per-job directory allocation
    pub(crate) workspaces: WorkspaceManager,
    /// The external transformation step
    pub(crate) transformer: Arc<dyn Transformer>,
    /// Cleared on shutdown to refuse new submissions
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled on shutdown to stop background tasks and the API server
    pub(crate) cancel: CancellationToken,
}

impl ArtifactBroker {
    /// Create a broker that runs the configured executable
    pub async fn new(config: Config) -> Result<Self> {
        let transformer = Arc::new(CliTransformer::from_config(&config.tool));
        Self::with_transformer(config, transformer).await
    }

    /// Create a broker with a custom transformation step
    ///
    /// Validates the configuration and creates the workspace root.
    pub async fn with_transformer(
        config: Config,
        transformer: Arc<dyn Transformer>,
    ) -> Result<Self> {
        config.validate()?;

        WorkspaceManager::new(&config.storage.work_dir, "")
            .ensure_root()
            .await?;
        // Absolute, symlink-free root so paths reported by the tool compare cleanly
        let root = tokio::fs::canonicalize(&config.storage.work_dir)
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "failed to resolve work directory {}: {e}",
                    config.storage.work_dir.display()
                ))
            })?;
        let workspaces = WorkspaceManager::new(root, config.storage.workspace_prefix.clone());

        tracing::info!(
            work_dir = %config.storage.work_dir.display(),
            transformer = transformer.name(),
            ttl = ?config.retention.ttl,
            "artifact broker initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            registry: ArtifactRegistry::new(),
            workspaces,
            transformer,
            accepting_new: Arc::new(AtomicBool::new(true)),
            cancel: CancellationToken::new(),
        })
    }

    /// Number of jobs whose artifacts can still be downloaded
    pub fn live_jobs(&self) -> usize {
        self.registry.len()
    }

    /// Whether new submissions are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Token cancelled when the broker shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
