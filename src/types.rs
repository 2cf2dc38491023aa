//! Core types for artifact-broker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Number of random bytes behind a [`JobId`]
pub const JOB_ID_BYTES: usize = 16;

/// Opaque, unguessable identifier of a completed job
///
/// Generated from OS randomness at registration time and rendered as
/// lowercase hex. It is the only external handle to a job's artifacts.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh identifier from 128 bits of OS randomness
    pub fn generate() -> Self {
        Self(crate::utils::random_hex(JOB_ID_BYTES))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.trim().to_string())
    }
}

/// Which of a job's output files is being addressed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// The transformed file
    Primary,
    /// The optional backup copy produced by the transformation step
    Secondary,
}

impl ArtifactKind {
    /// Path segment used in download URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Primary => "primary",
            ArtifactKind::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(ArtifactKind::Primary),
            "secondary" => Ok(ArtifactKind::Secondary),
            other => Err(crate::Error::NotFound(format!("artifact kind '{other}'"))),
        }
    }
}

/// Parsed `key: value` summary printed by the external tool
pub type Summary = BTreeMap<String, String>;

/// Options of a job submission, taken from the multipart form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOptions {
    /// Optional sheet/tab selector passed through to the tool
    pub sheet: Option<String>,
    /// Whether the tool should produce a backup copy (default: true)
    pub create_backup: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            create_backup: true,
        }
    }
}

/// An uploaded file handed to the broker
#[derive(Clone, Debug)]
pub struct Upload {
    /// Filename as sent by the client (unsanitized)
    pub filename: Option<String>,
    /// File contents
    pub content: Vec<u8>,
}

/// Outcome of a successful job submission
#[derive(Clone, Debug)]
pub struct JobReceipt {
    /// Identifier for both downloads
    pub job_id: JobId,
    /// Parsed tool summary (with `backup_path` reduced to a base name)
    pub summary: Summary,
    /// Whether a secondary artifact is available
    pub has_secondary: bool,
    /// Wall-clock moment after which both downloads 404
    pub expires_at: DateTime<Utc>,
}

/// Response body of `POST /process`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcessResponse {
    /// Always `true`
    pub ok: bool,
    /// Parsed `key: value` summary printed by the external tool
    pub resultado: Summary,
    /// Identifier shared by both download URLs
    pub download_id: JobId,
    /// URL of the primary artifact
    pub download_url_primary: String,
    /// URL of the secondary artifact, empty when none was produced
    pub download_url_secondary: String,
    /// Moment after which the downloads are gone
    pub expires_at: DateTime<Utc>,
}

impl ProcessResponse {
    /// Build the response for a receipt, with download URLs under `url_prefix`
    pub fn from_receipt(receipt: JobReceipt, url_prefix: &str) -> Self {
        let url_for = |kind: ArtifactKind| download_url(url_prefix, kind, &receipt.job_id);

        let download_url_primary = url_for(ArtifactKind::Primary);
        let download_url_secondary = if receipt.has_secondary {
            url_for(ArtifactKind::Secondary)
        } else {
            String::new()
        };

        Self {
            ok: true,
            resultado: receipt.summary,
            download_id: receipt.job_id,
            download_url_primary,
            download_url_secondary,
            expires_at: receipt.expires_at,
        }
    }
}

/// Relative URL of an artifact download
pub fn download_url(url_prefix: &str, kind: ArtifactKind, job_id: &JobId) -> String {
    format!(
        "{}/download/{}/{}",
        url_prefix.trim_end_matches('/'),
        kind,
        job_id
    )
}
