//! Error types for artifact-broker
//!
//! This module provides the error taxonomy of the broker:
//! - Domain-specific error types (validation, storage, external process, lookup)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//! - Bounded diagnostic tails for failed external invocations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for artifact-broker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for artifact-broker
///
/// Every failure surfaced by the broker maps to exactly one variant. None of
/// them is retried automatically; retry is the caller's responsibility.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "ttl")
        key: Option<String>,
    },

    /// Missing or invalid upload field
    #[error("{0}")]
    Validation(String),

    /// Workspace allocation or write failure
    #[error("storage error: {0}")]
    Storage(String),

    /// External process failure (spawn, non-zero exit, deadline)
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The configured external executable does not exist
    #[error("executable not found at {}", path.display())]
    ExecutableNotFound {
        /// The resolved path that was checked
        path: PathBuf,
    },

    /// Unknown, expired, already served or never produced artifact
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// External process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable could not be started
    #[error("failed to start {}: {reason}", binary.display())]
    SpawnFailed {
        /// Executable that failed to start
        binary: PathBuf,
        /// OS-level reason
        reason: String,
    },

    /// The process exited unsuccessfully
    #[error("external tool failed ({})", describe_exit(*exit_code))]
    Failed {
        /// Exit code, `None` when the process was killed by a signal
        exit_code: Option<i32>,
        /// Bounded tail of standard output
        stdout_tail: String,
        /// Bounded tail of standard error
        stderr_tail: String,
    },

    /// The process exceeded its deadline and was killed
    #[error("processing exceeded the time limit of {}s", after.as_secs())]
    TimedOut {
        /// The deadline that was exceeded
        after: Duration,
    },
}

fn describe_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs. The
/// `ok`/`error` pair keeps existing clients working; `code` is the
/// machine-readable classification.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "ok": false,
///   "error": "external tool failed (exit status 2)",
///   "code": "execution_error",
///   "stdout_tail": "",
///   "stderr_tail": "Unhandled exception: sheet not found"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always `false`
    pub ok: bool,

    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code (e.g., "not_found", "timeout")
    pub code: String,

    /// Bounded tail of the external tool's standard output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_tail: Option<String>,

    /// Bounded tail of the external tool's standard error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: message.into(),
            code: code.into(),
            stdout_tail: None,
            stderr_tail: None,
        }
    }

    /// Attach diagnostic tails of the external tool's output streams
    pub fn with_tails(mut self, stdout_tail: String, stderr_tail: String) -> Self {
        self.stdout_tail = Some(stdout_tail);
        self.stderr_tail = Some(stderr_tail);
        self
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 500 Internal Server Error - Server-side issues
            Error::Storage(_) => 500,
            Error::Process(ProcessError::SpawnFailed { .. }) => 500,
            Error::Process(ProcessError::Failed { .. }) => 500,
            Error::ExecutableNotFound { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout - the external tool took too long
            Error::Process(ProcessError::TimedOut { .. }) => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Storage(_) => "storage_error",
            Error::Process(e) => match e {
                ProcessError::SpawnFailed { .. } => "spawn_failed",
                ProcessError::Failed { .. } => "execution_error",
                ProcessError::TimedOut { .. } => "timeout",
            },
            Error::ExecutableNotFound { .. } => "executable_not_found",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let api_error = ApiError::new(error.error_code(), error.to_string());

        match error {
            Error::Process(ProcessError::Failed {
                stdout_tail,
                stderr_tail,
                ..
            }) => api_error.with_tails(stdout_tail, stderr_tail),
            _ => api_error,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Returns a vec of (Error, expected_status_code, expected_error_code) for
    /// every reachable match arm in ToHttpStatus.
    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "ttl must be positive".into(),
                    key: Some("ttl".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::Validation("field 'file' is required".into()),
                400,
                "validation_error",
            ),
            (Error::NotFound("job abc".into()), 404, "not_found"),
            (
                Error::Storage("failed to create workspace".into()),
                500,
                "storage_error",
            ),
            (
                Error::Process(ProcessError::SpawnFailed {
                    binary: PathBuf::from("/opt/tool"),
                    reason: "permission denied".into(),
                }),
                500,
                "spawn_failed",
            ),
            (
                Error::Process(ProcessError::Failed {
                    exit_code: Some(2),
                    stdout_tail: String::new(),
                    stderr_tail: "boom".into(),
                }),
                500,
                "execution_error",
            ),
            (
                Error::Process(ProcessError::TimedOut {
                    after: Duration::from_secs(600),
                }),
                504,
                "timeout",
            ),
            (
                Error::ExecutableNotFound {
                    path: PathBuf::from("/opt/missing"),
                },
                500,
                "executable_not_found",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn test_every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn test_timeout_is_distinct_from_execution_failure() {
        let timeout = Error::Process(ProcessError::TimedOut {
            after: Duration::from_secs(1),
        });
        let failed = Error::Process(ProcessError::Failed {
            exit_code: Some(1),
            stdout_tail: String::new(),
            stderr_tail: String::new(),
        });

        assert_ne!(timeout.status_code(), failed.status_code());
        assert_ne!(timeout.error_code(), failed.error_code());
    }

    #[test]
    fn test_execution_failure_carries_tails_into_api_error() {
        let error = Error::Process(ProcessError::Failed {
            exit_code: Some(3),
            stdout_tail: "partial".into(),
            stderr_tail: "trace".into(),
        });
        let api_error: ApiError = error.into();

        assert!(!api_error.ok);
        assert_eq!(api_error.code, "execution_error");
        assert!(api_error.error.contains("exit status 3"));
        assert_eq!(api_error.stdout_tail.as_deref(), Some("partial"));
        assert_eq!(api_error.stderr_tail.as_deref(), Some("trace"));
    }

    #[test]
    fn test_signal_death_is_described_without_exit_code() {
        let error = ProcessError::Failed {
            exit_code: None,
            stdout_tail: String::new(),
            stderr_tail: String::new(),
        };
        assert!(error.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_tails_are_omitted_from_json_for_other_errors() {
        let api_error: ApiError = Error::NotFound("job x".into()).into();
        let json = serde_json::to_value(&api_error).unwrap();

        assert_eq!(json["ok"], false);
        assert_eq!(json["code"], "not_found");
        assert!(json.get("stdout_tail").is_none());
        assert!(json.get("stderr_tail").is_none());
    }
}
