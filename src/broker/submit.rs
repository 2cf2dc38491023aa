//! Job submission: workspace allocation, external tool run, registration.

use crate::error::{Error, Result};
use crate::invoker::{InvokeRequest, parse_summary};
use crate::registry::{Expiry, NewArtifact};
use crate::types::{JobOptions, JobReceipt, Summary, Upload};
use crate::utils::{default_backup_path, ensure_extension, sanitize_filename};
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};

use super::ArtifactBroker;

/// Summary key under which the tool reports its backup file
const BACKUP_PATH_KEY: &str = "backup_path";

/// Deletes the workspace unless the job got registered
///
/// Covers the request future being dropped mid-job (client disconnect)
/// as well as explicit error returns.
struct PendingWorkspace(Option<Workspace>);

impl PendingWorkspace {
    fn get(&self) -> Result<&Workspace> {
        self.0
            .as_ref()
            .ok_or_else(|| Error::Other("workspace already handed over".into()))
    }

    fn take(&mut self) -> Result<Workspace> {
        self.0
            .take()
            .ok_or_else(|| Error::Other("workspace already handed over".into()))
    }
}

impl Drop for PendingWorkspace {
    fn drop(&mut self) {
        if let Some(workspace) = self.0.take() {
            tracing::debug!(workspace = %workspace.path().display(), "discarding unfinished job workspace");
            workspace.remove_detached();
        }
    }
}

/// Outputs of a successful tool run, before registration
struct FinishedJob {
    primary_path: PathBuf,
    secondary_path: Option<PathBuf>,
    summary: Summary,
}

impl ArtifactBroker {
    /// Run one job and register its artifacts
    ///
    /// Saves the upload into a fresh workspace, runs the transformation step
    /// on it and registers the outputs for download. On any failure the
    /// workspace is removed before the error is returned and nothing is
    /// registered.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) started
    /// - [`Error::Storage`] when the workspace cannot be prepared
    /// - [`Error::ExecutableNotFound`] when the configured tool is missing
    /// - [`Error::Process`] when the tool fails or exceeds its deadline
    pub async fn submit(&self, upload: Upload, options: JobOptions) -> Result<JobReceipt> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let mut pending = PendingWorkspace(Some(self.workspaces.allocate().await?));

        let outcome = self.run_job(pending.get()?, upload, &options).await;
        let finished = match outcome {
            Ok(finished) => finished,
            Err(e) => {
                tracing::warn!(error = %e, "job failed, removing workspace");
                self.workspaces.release_logged(pending.take()?).await;
                return Err(e);
            }
        };

        let expiry = Expiry::after(self.config.retention.ttl);
        let has_secondary = finished.secondary_path.is_some();
        // A drained registry refuses the record, closing the race with shutdown
        let registered = self.registry.register(NewArtifact {
            primary_path: finished.primary_path,
            secondary_path: finished.secondary_path,
            workspace: pending.take()?,
            expiry,
        });
        let job_id = match registered {
            Ok(job_id) => job_id,
            Err(workspace) => {
                tracing::info!("shutdown started while the tool was running, discarding job");
                self.workspaces.release_logged(workspace).await;
                return Err(Error::ShuttingDown);
            }
        };

        tracing::info!(
            job_id = %job_id,
            has_secondary,
            expires_at = %expiry.wall_clock(),
            "job completed, artifacts registered"
        );

        Ok(JobReceipt {
            job_id,
            summary: finished.summary,
            has_secondary,
            expires_at: expiry.wall_clock(),
        })
    }

    async fn run_job(
        &self,
        workspace: &Workspace,
        upload: Upload,
        options: &JobOptions,
    ) -> Result<FinishedJob> {
        let storage = &self.config.storage;

        let mut file_name = sanitize_filename(upload.filename.as_deref().unwrap_or_default());
        if file_name.is_empty() {
            file_name = storage.default_input_name.clone();
        }
        let file_name = ensure_extension(&file_name, &storage.input_extension);

        let input_path = workspace.join(&file_name);
        tokio::fs::write(&input_path, &upload.content)
            .await
            .map_err(|e| Error::Storage(format!("failed to save uploaded file: {e}")))?;

        tracing::debug!(
            workspace = %workspace.path().display(),
            file = %file_name,
            bytes = upload.content.len(),
            "upload saved"
        );

        let mut args = Vec::new();
        if let Some(sheet) = options.sheet.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            args.push(sheet.to_string());
        }
        if !options.create_backup {
            args.push(self.config.tool.no_backup_flag.clone());
        }

        let output = self
            .transformer
            .invoke(InvokeRequest {
                input_path: input_path.clone(),
                work_dir: workspace.path().to_path_buf(),
                args,
                deadline: self.config.tool.timeout,
            })
            .await?;

        let mut summary = parse_summary(&output.stdout);
        let secondary_path = self
            .locate_backup(workspace, &input_path, &summary, options.create_backup)
            .await;

        // Only the base name is exposed to clients
        let backup_name = secondary_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        summary.insert(BACKUP_PATH_KEY.to_string(), backup_name);

        Ok(FinishedJob {
            primary_path: input_path,
            secondary_path,
            summary,
        })
    }

    /// Find the backup copy the tool produced, if any
    ///
    /// Uses the path the tool reported, or the conventional location next
    /// to the input when backups were requested. Paths outside the
    /// workspace are never served.
    async fn locate_backup(
        &self,
        workspace: &Workspace,
        input_path: &Path,
        summary: &Summary,
        create_backup: bool,
    ) -> Option<PathBuf> {
        let reported = summary
            .get(BACKUP_PATH_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());

        let candidate = match reported {
            Some(raw) => {
                let raw = Path::new(raw);
                if raw.is_absolute() {
                    raw.to_path_buf()
                } else {
                    workspace.join(raw)
                }
            }
            None if create_backup => {
                default_backup_path(input_path, &self.config.storage.backup_suffix)
            }
            None => return None,
        };

        if !workspace.contains(&candidate) {
            tracing::warn!(
                path = %candidate.display(),
                "ignoring backup path outside the job workspace"
            );
            return None;
        }

        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => Some(candidate),
            _ => {
                tracing::debug!(path = %candidate.display(), "no backup file produced");
                None
            }
        }
    }
}
