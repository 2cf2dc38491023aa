//! In-flight transfer guard

use super::{ArtifactRegistry, MarkOutcome};
use crate::types::{ArtifactKind, JobId};
use tracing::debug;

/// One in-flight transfer of an artifact
///
/// While a claim exists the record's workspace is never deleted. Completing
/// the claim marks the artifact served; dropping it without completing (a
/// failed or abandoned transfer) leaves the artifact downloadable. If the
/// record expired in the meantime, the last claim to go away deletes the
/// workspace.
#[derive(Debug)]
pub struct ServeClaim {
    registry: ArtifactRegistry,
    job_id: JobId,
    kind: ArtifactKind,
    finished: bool,
}

impl ServeClaim {
    pub(super) fn new(registry: ArtifactRegistry, job_id: JobId, kind: ArtifactKind) -> Self {
        Self {
            registry,
            job_id,
            kind,
            finished: false,
        }
    }

    /// Job this claim belongs to
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Artifact being transferred
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Report a successful transfer
    pub fn complete(mut self) -> MarkOutcome {
        self.finished = true;
        self.registry.complete_claim(&self.job_id, self.kind)
    }
}

impl Drop for ServeClaim {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        debug!(job_id = %self.job_id, kind = %self.kind, "transfer abandoned");
        if let Some(workspace) = self.registry.abandon_claim(&self.job_id) {
            workspace.remove_detached();
        }
    }
}
