//! Artifact downloads with one-shot serve tracking.

use crate::error::{Error, Result};
use crate::registry::{Lookup, ServeClaim};
use crate::types::{ArtifactKind, JobId};
use crate::utils::attachment_disposition;
use axum::body::Bytes;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::ArtifactBroker;

/// A download ready to be streamed
pub struct ArtifactDownload {
    /// Job the artifact belongs to
    pub job_id: JobId,
    /// Which artifact this is
    pub kind: ArtifactKind,
    /// File being served
    pub path: PathBuf,
    /// File size in bytes
    pub len: u64,
    /// `Content-Type` to send
    pub content_type: String,
    /// `Content-Disposition` to send
    pub content_disposition: String,
    /// File contents
    pub body: ArtifactStream,
}

/// File contents that mark the artifact served once fully read
///
/// Reaching end of file completes the transfer claim. An I/O error or
/// dropping the stream early (client disconnect) abandons the claim
/// instead, leaving the artifact downloadable until it expires.
pub struct ArtifactStream {
    inner: ReaderStream<File>,
    claim: Option<ServeClaim>,
}

impl ArtifactStream {
    fn new(file: File, claim: ServeClaim) -> Self {
        Self {
            inner: ReaderStream::new(file),
            claim: Some(claim),
        }
    }

    fn finish(&mut self) {
        let Some(claim) = self.claim.take() else {
            return;
        };

        let job_id = claim.job_id().clone();
        let kind = claim.kind();
        let outcome = claim.complete();
        tracing::info!(job_id = %job_id, kind = %kind, still_live = outcome.still_live, "artifact served");

        if let Some(workspace) = outcome.reclaim {
            tracing::debug!(job_id = %job_id, "all artifacts served, removing workspace");
            workspace.remove_detached();
        }
    }
}

impl Stream for ArtifactStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                if let Some(claim) = this.claim.take() {
                    tracing::warn!(job_id = %claim.job_id(), error = %e, "artifact transfer failed");
                }
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl ArtifactBroker {
    /// Open an artifact for download
    ///
    /// Returns [`Error::NotFound`] when the job is unknown, expired or fully
    /// served, when it never had the requested artifact, when that artifact
    /// was already served, or when its file is missing. None of these
    /// touch serve state, except that an expired job found here is removed
    /// together with its workspace.
    pub async fn serve(&self, job_id: &JobId, kind: ArtifactKind) -> Result<ArtifactDownload> {
        let not_found = || Error::NotFound(format!("{kind} artifact of job {job_id}"));

        let snapshot = match self.registry.lookup(job_id) {
            Lookup::Found(snapshot) => snapshot,
            Lookup::NotFound { reclaim } => {
                if let Some(workspace) = reclaim {
                    tracing::debug!(job_id = %job_id, "job expired, removing workspace");
                    self.workspaces.release_logged(workspace).await;
                }
                return Err(not_found());
            }
        };

        if snapshot.is_served(kind) {
            return Err(not_found());
        }
        let path = snapshot.path(kind).ok_or_else(not_found)?.to_path_buf();

        let len = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(not_found()),
        };

        let claim = self.registry.claim(job_id, kind).ok_or_else(not_found)?;
        // Dropping the claim on error keeps the artifact downloadable
        let file = File::open(&path).await.map_err(|_| not_found())?;

        tracing::debug!(job_id = %job_id, kind = %kind, bytes = len, "streaming artifact");

        Ok(ArtifactDownload {
            job_id: job_id.clone(),
            kind,
            content_type: self.config.api.artifact_content_type.clone(),
            content_disposition: attachment_disposition(&path),
            path,
            len,
            body: ArtifactStream::new(file, claim),
        })
    }
}
