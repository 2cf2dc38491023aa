//! # artifact-broker
//!
//! Short-lived job broker for an external file-processing tool.
//!
//! A client uploads a spreadsheet; the broker saves it into a private
//! per-job workspace, runs the configured executable on it under a deadline
//! and hands back an unguessable job id. The transformed file (and the
//! backup copy the tool may leave behind) can then each be downloaded
//! exactly once before the job expires. Workspaces are removed as soon as
//! nothing in them can be served anymore.
//!
//! ## Quick Start
//!
//! ```no_run
//! use artifact_broker::{ArtifactBroker, Config, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.tool.binary_path = "/opt/tools/AjusteDiarioGfbr".into();
//!
//!     let broker = ArtifactBroker::new(config).await?;
//!     broker.start_sweeper();
//!
//!     tokio::spawn(run_with_shutdown(broker.clone()));
//!     artifact_broker::api::start_api_server(broker).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Job broker tying the other components together
pub mod broker;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// External tool invocation
pub mod invoker;
/// In-memory registry of downloadable artifacts
pub mod registry;
/// Periodic removal of expired jobs
pub mod sweeper;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Per-job working directories
pub mod workspace;

// Re-export commonly used types
pub use broker::{ArtifactBroker, ArtifactDownload, ArtifactStream};
pub use config::{ApiConfig, Config, RetentionConfig, StorageConfig, ToolConfig};
pub use error::{ApiError, Error, ProcessError, Result, ToHttpStatus};
pub use invoker::{CliTransformer, InvokeRequest, ProcessOutput, Transformer};
pub use registry::ArtifactRegistry;
pub use sweeper::ExpirationSweeper;
pub use types::{ArtifactKind, JobId, JobOptions, JobReceipt, ProcessResponse, Summary, Upload};
pub use workspace::{Workspace, WorkspaceManager};

/// Helper function to run the broker with graceful signal handling.
///
/// Waits for a termination signal and then calls the broker's `shutdown()`
/// method. Returns early without shutting down again if the broker was
/// already shut down by other means.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use artifact_broker::{ArtifactBroker, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let broker = ArtifactBroker::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(broker).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(broker: ArtifactBroker) -> Result<()> {
    let token = broker.shutdown_token();
    tokio::select! {
        _ = wait_for_signal() => broker.shutdown().await,
        _ = token.cancelled() => Ok(()),
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
