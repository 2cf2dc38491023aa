//! Registry of downloadable artifacts
//!
//! The registry is the single source of truth for which job artifacts can
//! still be downloaded and for who gets to delete a job's workspace.
//!
//! All state sits behind one [`std::sync::Mutex`] that is held only for map
//! operations, never across an `.await` and never during filesystem I/O.
//! Deletion rights are transferred by moving the job's [`Workspace`] out of
//! the map; since the handle is not `Clone`, at most one caller can ever
//! receive it.
//!
//! A record leaves the registry in one of three ways:
//!
//! - every present artifact was served ([`ArtifactRegistry::mark_served`])
//! - it expired and was found by [`ArtifactRegistry::lookup`] or
//!   [`ArtifactRegistry::sweep`]
//! - the broker shut down ([`ArtifactRegistry::drain`])
//!
//! After a drain the registry is closed and refuses new records, so a job
//! finishing during shutdown cannot leave an unowned workspace behind.
//!
//! If transfers are still in flight at that moment, the record is only
//! *evicted*: it becomes invisible, and the last [`ServeClaim`] to finish
//! takes over the workspace.

mod claim;

pub use claim::ServeClaim;

use crate::types::{ArtifactKind, JobId};
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound applied to retention periods before converting them
const MAX_RETENTION: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Moment a record stops being downloadable
///
/// Tracked on the monotonic clock for decisions and on the wall clock for
/// reporting to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    deadline: Instant,
    wall: DateTime<Utc>,
}

impl Expiry {
    /// Expiry `ttl` from now
    pub fn after(ttl: Duration) -> Self {
        let ttl = ttl.min(MAX_RETENTION);
        let wall = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            deadline: Instant::now() + ttl,
            wall,
        }
    }

    /// Monotonic deadline
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wall-clock time reported to clients
    pub fn wall_clock(&self) -> DateTime<Utc> {
        self.wall
    }

    fn has_passed(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}

/// Input to [`ArtifactRegistry::register`]
#[derive(Debug)]
pub struct NewArtifact {
    /// The transformed file
    pub primary_path: PathBuf,
    /// The backup copy, when the tool reported or produced one
    pub secondary_path: Option<PathBuf>,
    /// Directory owning both files
    pub workspace: Workspace,
    /// When the artifacts stop being downloadable
    pub expiry: Expiry,
}

/// Point-in-time copy of a live record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSnapshot {
    /// Job identifier
    pub job_id: JobId,
    /// Path of the primary artifact
    pub primary_path: PathBuf,
    /// Path of the secondary artifact, if any
    pub secondary_path: Option<PathBuf>,
    /// Whether the primary has been fully served
    pub primary_served: bool,
    /// Whether the secondary has been fully served (false when absent)
    pub secondary_served: bool,
    /// When the record expires
    pub expires_at: DateTime<Utc>,
}

impl ArtifactSnapshot {
    /// Path of the requested artifact, `None` when the job never had one
    pub fn path(&self, kind: ArtifactKind) -> Option<&Path> {
        match kind {
            ArtifactKind::Primary => Some(&self.primary_path),
            ArtifactKind::Secondary => self.secondary_path.as_deref(),
        }
    }

    /// Whether the requested artifact was already served
    pub fn is_served(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Primary => self.primary_served,
            ArtifactKind::Secondary => self.secondary_served,
        }
    }
}

/// Result of [`ArtifactRegistry::lookup`]
#[derive(Debug)]
pub enum Lookup {
    /// The record is live
    Found(ArtifactSnapshot),
    /// Unknown, expired or evicted
    NotFound {
        /// Workspace of a record that expired during this lookup; the
        /// caller must delete it
        reclaim: Option<Workspace>,
    },
}

/// Result of [`ArtifactRegistry::mark_served`]
#[must_use]
#[derive(Debug, Default)]
pub struct MarkOutcome {
    /// Whether the record is still downloadable afterwards
    pub still_live: bool,
    /// Workspace handed to the caller for deletion
    pub reclaim: Option<Workspace>,
}

#[derive(Debug)]
struct Slot {
    path: PathBuf,
    served: bool,
}

#[derive(Debug)]
struct Record {
    primary: Slot,
    secondary: Option<Slot>,
    workspace: Option<Workspace>,
    expiry: Expiry,
    in_flight: usize,
    evicted: bool,
}

impl Record {
    fn slot_mut(&mut self, kind: ArtifactKind) -> Option<&mut Slot> {
        match kind {
            ArtifactKind::Primary => Some(&mut self.primary),
            ArtifactKind::Secondary => self.secondary.as_mut(),
        }
    }

    fn slot(&self, kind: ArtifactKind) -> Option<&Slot> {
        match kind {
            ArtifactKind::Primary => Some(&self.primary),
            ArtifactKind::Secondary => self.secondary.as_ref(),
        }
    }

    /// A missing secondary counts as served
    fn fully_served(&self) -> bool {
        self.primary.served && self.secondary.as_ref().is_none_or(|s| s.served)
    }

    fn snapshot(&self, job_id: &JobId) -> ArtifactSnapshot {
        ArtifactSnapshot {
            job_id: job_id.clone(),
            primary_path: self.primary.path.clone(),
            secondary_path: self.secondary.as_ref().map(|s| s.path.clone()),
            primary_served: self.primary.served,
            secondary_served: self.secondary.as_ref().is_some_and(|s| s.served),
            expires_at: self.expiry.wall_clock(),
        }
    }
}

type Records = HashMap<JobId, Record>;

#[derive(Debug, Default)]
struct State {
    records: Records,
    closed: bool,
}

/// Concurrent map from job identifier to artifact state
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    state: Arc<Mutex<State>>,
}

impl ArtifactRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every critical section leaves the map consistent, so a panic
        // elsewhere does not invalidate it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record under a freshly generated identifier
    ///
    /// Once the registry has been drained the record is refused and its
    /// workspace handed back for deletion.
    pub fn register(&self, artifact: NewArtifact) -> Result<JobId, Workspace> {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            debug!("registry closed, refusing new record");
            return Err(artifact.workspace);
        }

        let record = Record {
            primary: Slot {
                path: artifact.primary_path,
                served: false,
            },
            secondary: artifact.secondary_path.map(|path| Slot {
                path,
                served: false,
            }),
            workspace: Some(artifact.workspace),
            expiry: artifact.expiry,
            in_flight: 0,
            evicted: false,
        };

        let records = &mut state.records;
        let job_id = loop {
            let candidate = JobId::generate();
            if !records.contains_key(&candidate) {
                break candidate;
            }
        };
        records.insert(job_id.clone(), record);
        drop(state);

        debug!(job_id = %job_id, "registered artifacts");
        Ok(job_id)
    }

    /// Resolve a live record
    ///
    /// An expired record is removed by this call and its workspace is
    /// returned in [`Lookup::NotFound`] for deletion outside the lock.
    pub fn lookup(&self, job_id: &JobId) -> Lookup {
        self.lookup_at(job_id, Instant::now())
    }

    pub(crate) fn lookup_at(&self, job_id: &JobId, now: Instant) -> Lookup {
        let mut state = self.lock();
        let records = &mut state.records;

        let Some(record) = records.get_mut(job_id) else {
            return Lookup::NotFound { reclaim: None };
        };

        if record.evicted {
            return Lookup::NotFound { reclaim: None };
        }

        if record.expiry.has_passed(now) {
            debug!(job_id = %job_id, "lookup found expired record");
            return Lookup::NotFound {
                reclaim: retire(records, job_id),
            };
        }

        Lookup::Found(record.snapshot(job_id))
    }

    /// Start a transfer of one artifact
    ///
    /// Fails when the record is not live, has no such artifact or the
    /// artifact was already served. The returned claim must be completed
    /// with [`ServeClaim::complete`] once the transfer succeeded; dropping
    /// it instead leaves the artifact downloadable.
    pub fn claim(&self, job_id: &JobId, kind: ArtifactKind) -> Option<ServeClaim> {
        self.claim_at(job_id, kind, Instant::now())
    }

    pub(crate) fn claim_at(
        &self,
        job_id: &JobId,
        kind: ArtifactKind,
        now: Instant,
    ) -> Option<ServeClaim> {
        let mut state = self.lock();
        let record = state.records.get_mut(job_id)?;

        if record.evicted || record.expiry.has_passed(now) {
            return None;
        }
        if record.slot(kind)?.served {
            return None;
        }

        record.in_flight += 1;
        Some(ServeClaim::new(self.clone(), job_id.clone(), kind))
    }

    /// Record a completed transfer
    ///
    /// Only the first completion for an artifact flips its flag. When every
    /// present artifact is served the record is removed; its workspace is
    /// handed back unless transfers are still running, in which case the
    /// last one to finish takes it.
    pub fn mark_served(&self, job_id: &JobId, kind: ArtifactKind) -> MarkOutcome {
        let mut state = self.lock();
        mark_served_locked(&mut state.records, job_id, kind)
    }

    /// Remove every record expired at `now`
    ///
    /// Records with transfers in flight are evicted instead; their last
    /// claim reclaims the workspace.
    pub fn sweep(&self, now: Instant) -> Vec<Workspace> {
        let mut state = self.lock();
        let records = &mut state.records;

        let expired: Vec<JobId> = records
            .iter()
            .filter(|(_, r)| !r.evicted && r.expiry.has_passed(now))
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|job_id| retire(records, job_id))
            .collect()
    }

    /// Remove every record regardless of state and close the registry,
    /// for shutdown
    pub fn drain(&self) -> Vec<Workspace> {
        let mut state = self.lock();
        state.closed = true;
        let records = &mut state.records;

        let ids: Vec<JobId> = records
            .iter()
            .filter(|(_, r)| !r.evicted)
            .map(|(id, _)| id.clone())
            .collect();

        ids.iter()
            .filter_map(|job_id| retire(records, job_id))
            .collect()
    }

    /// Number of live (visible) records
    pub fn len(&self) -> usize {
        self.lock().records.values().filter(|r| !r.evicted).count()
    }

    /// Whether no record is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Called by a claim that finished its transfer
    fn complete_claim(&self, job_id: &JobId, kind: ArtifactKind) -> MarkOutcome {
        let mut state = self.lock();
        let records = &mut state.records;
        if let Some(record) = records.get_mut(job_id) {
            record.in_flight = record.in_flight.saturating_sub(1);
        }
        mark_served_locked(records, job_id, kind)
    }

    /// Called by a claim dropped without completing
    fn abandon_claim(&self, job_id: &JobId) -> Option<Workspace> {
        let mut state = self.lock();
        let records = &mut state.records;
        let record = records.get_mut(job_id)?;
        record.in_flight = record.in_flight.saturating_sub(1);

        if record.evicted && record.in_flight == 0 {
            return records.remove(job_id).and_then(|r| r.workspace);
        }
        None
    }
}

/// Take a record out of service
///
/// Without transfers in flight the record is removed and its workspace
/// returned. Otherwise it is only evicted.
fn retire(records: &mut Records, job_id: &JobId) -> Option<Workspace> {
    let record = records.get_mut(job_id)?;
    if record.in_flight > 0 {
        record.evicted = true;
        return None;
    }
    records.remove(job_id).and_then(|r| r.workspace)
}

fn mark_served_locked(records: &mut Records, job_id: &JobId, kind: ArtifactKind) -> MarkOutcome {
    let Some(record) = records.get_mut(job_id) else {
        return MarkOutcome::default();
    };

    if record.evicted {
        // Finishing the last transfer of an evicted record hands over its workspace
        let reclaim = if record.in_flight == 0 {
            records.remove(job_id).and_then(|r| r.workspace)
        } else {
            None
        };
        return MarkOutcome {
            still_live: false,
            reclaim,
        };
    }

    if let Some(slot) = record.slot_mut(kind) {
        slot.served = true;
    }

    if !record.fully_served() {
        return MarkOutcome {
            still_live: true,
            reclaim: None,
        };
    }

    debug!(job_id = %job_id, "all artifacts served");
    MarkOutcome {
        still_live: false,
        reclaim: retire(records, job_id),
    }
}
