//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job submission
//! - [`artifacts`] - One-shot artifact downloads
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};

mod artifacts;
mod jobs;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use artifacts::*;
pub use jobs::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Multipart form accepted by `POST /process`
///
/// Documentation only: the handler reads the fields one by one. Each field
/// also accepts a legacy alias (`arquivo`, `aba`, `criar_backup`).
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProcessForm {
    /// The spreadsheet to process (alias `arquivo`)
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Optional sheet/tab selector passed to the tool (alias `aba`)
    pub sheet: Option<String>,
    /// Whether to keep a backup copy, default true; accepts
    /// `1/0/true/false/yes/no/y/n` and integers (alias `criar_backup`)
    pub create_backup: Option<String>,
}

/// Response body of `GET /health`
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: String,
    /// Crate version
    pub version: String,
    /// Jobs with artifacts still downloadable
    pub live_jobs: usize,
}
