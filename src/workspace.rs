//! Per-job temporary directories
//!
//! Every job gets its own directory under a single root owned by the
//! process. A [`Workspace`] handle is deliberately not `Clone`: whoever
//! holds it is the one party allowed to delete the directory.

use crate::error::{Error, Result};
use crate::utils::random_hex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Random bytes in a workspace directory name
const WORKSPACE_NAME_BYTES: usize = 8;

/// Attempts before giving up on finding an unused directory name
const MAX_ALLOCATE_ATTEMPTS: usize = 8;

/// Handle to one job's directory
///
/// Owning the handle means owning the right to delete the directory.
#[derive(Debug, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the workspace
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Whether `candidate` lies inside this workspace
    ///
    /// Purely lexical: `..` components are rejected rather than resolved.
    pub fn contains(&self, candidate: &Path) -> bool {
        let escapes = candidate
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
        !escapes && candidate.starts_with(&self.path) && candidate != self.path
    }

    /// Remove the directory tree; a missing directory counts as removed
    pub async fn remove(self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Remove the directory without waiting for it
    ///
    /// Runs on the current tokio runtime when there is one, otherwise
    /// removes synchronously. Failures are logged.
    pub fn remove_detached(self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let path = self.path.clone();
                    if let Err(e) = self.remove().await {
                        warn!(workspace = %path.display(), error = %e, "failed to remove workspace");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = std::fs::remove_dir_all(&self.path)
                    && e.kind() != ErrorKind::NotFound
                {
                    warn!(workspace = %self.path.display(), error = %e, "failed to remove workspace");
                }
            }
        }
    }
}

/// Allocates and releases job workspaces under one root directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    prefix: String,
}

impl WorkspaceManager {
    /// Create a manager for `root`; nothing touches the disk until
    /// [`ensure_root`](Self::ensure_root) or [`allocate`](Self::allocate)
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::Storage(format!(
                "failed to create work directory {}: {e}",
                self.root.display()
            ))
        })
    }

    /// Create a fresh, uniquely named directory
    ///
    /// Uses exclusive `create_dir` so two live jobs can never share a
    /// directory, even if random names collide.
    pub async fn allocate(&self) -> Result<Workspace> {
        self.ensure_root().await?;

        for _ in 0..MAX_ALLOCATE_ATTEMPTS {
            let name = format!("{}-{}", self.prefix, random_hex(WORKSPACE_NAME_BYTES));
            let path = self.root.join(name);

            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    debug!(workspace = %path.display(), "allocated workspace");
                    return Ok(Workspace { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Error::Storage(format!(
                        "failed to create workspace {}: {e}",
                        path.display()
                    )));
                }
            }
        }

        Err(Error::Storage(format!(
            "no free workspace name under {} after {MAX_ALLOCATE_ATTEMPTS} attempts",
            self.root.display()
        )))
    }

    /// Recursively remove a workspace
    ///
    /// Idempotent: an already removed directory is not an error.
    pub async fn release(&self, workspace: Workspace) -> Result<()> {
        let path = workspace.path.clone();
        workspace.remove().await.map_err(|e| {
            Error::Storage(format!("failed to remove workspace {}: {e}", path.display()))
        })?;
        debug!(workspace = %path.display(), "released workspace");
        Ok(())
    }

    /// Release a workspace, logging instead of returning failures
    pub async fn release_logged(&self, workspace: Workspace) {
        if let Err(e) = self.release(workspace).await {
            warn!(error = %e, "workspace cleanup failed");
        }
    }
}

#[cfg(test)]
impl Workspace {
    /// Wrap an existing directory, for tests that build records by hand
    pub(crate) fn for_test(path: PathBuf) -> Self {
        Self { path }
    }
}
