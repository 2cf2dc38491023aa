//! Traits and types for running the external transformation step

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// One invocation of the external tool
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Uploaded file, passed as the first positional argument
    pub input_path: PathBuf,
    /// Working directory of the process (the job's workspace)
    pub work_dir: PathBuf,
    /// Extra arguments appended after the input path
    pub args: Vec<String>,
    /// Hard wall-clock limit; the process is killed when it is reached
    pub deadline: Duration,
}

/// Captured output of a successful invocation
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Full standard output, lossily decoded as UTF-8
    pub stdout: String,
    /// Full standard error, lossily decoded as UTF-8
    pub stderr: String,
}

/// Trait for the step that turns an uploaded file into artifacts
///
/// The broker only cares about the classification of the outcome:
/// success with captured output, a failure carrying bounded diagnostics, or
/// a deadline overrun. Implementations report the latter two as
/// [`ProcessError`](crate::error::ProcessError) wrapped in
/// [`Error::Process`](crate::Error::Process).
///
/// # Examples
///
/// ```no_run
/// use artifact_broker::invoker::{CliTransformer, InvokeRequest, Transformer};
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tool = CliTransformer::new(PathBuf::from("/opt/tools/convert"), 4000);
///
/// let output = tool
///     .invoke(InvokeRequest {
///         input_path: PathBuf::from("/srv/work/job-1/input.xlsx"),
///         work_dir: PathBuf::from("/srv/work/job-1"),
///         args: vec!["Sheet1".to_string()],
///         deadline: Duration::from_secs(600),
///     })
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Run the tool once and classify the outcome
    async fn invoke(&self, request: InvokeRequest) -> crate::Result<ProcessOutput>;

    /// Human-readable name used in logs
    fn name(&self) -> &'static str;
}
