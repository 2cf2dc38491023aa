//! Transformer backed by an external executable

use super::traits::{InvokeRequest, ProcessOutput, Transformer};
use crate::config::ToolConfig;
use crate::error::ProcessError;
use crate::utils::tail_chars;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs the configured executable as `<bin> <input> [args...]`
///
/// Both output pipes are drained concurrently with the process wait, so a
/// child that fills one pipe while the other is idle cannot stall. The
/// child is killed when the deadline passes and also when the invoking
/// future is dropped.
pub struct CliTransformer {
    binary_path: PathBuf,
    tail_chars: usize,
}

impl CliTransformer {
    /// Create a transformer for an explicit executable
    ///
    /// # Arguments
    ///
    /// * `binary_path` - Path to the executable
    /// * `tail_chars` - Characters of each stream kept on failure
    pub fn new(binary_path: PathBuf, tail_chars: usize) -> Self {
        Self {
            binary_path,
            tail_chars,
        }
    }

    /// Create a transformer from the tool settings
    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.binary_path.clone(), config.tail_chars)
    }

    /// Executable this transformer runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

async fn drain(pipe: Option<impl AsyncRead + Unpin>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[async_trait]
impl Transformer for CliTransformer {
    async fn invoke(&self, request: InvokeRequest) -> crate::Result<ProcessOutput> {
        debug!(
            binary = %self.binary_path.display(),
            input = %request.input_path.display(),
            args = ?request.args,
            "starting external tool"
        );
        let started = Instant::now();

        // Checked per call: the executable may be deployed after startup
        match tokio::fs::metadata(&self.binary_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(crate::Error::ExecutableNotFound {
                    path: self.binary_path.clone(),
                });
            }
        }

        let mut child = Command::new(&self.binary_path)
            .arg(&request.input_path)
            .args(&request.args)
            .current_dir(&request.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed {
                binary: self.binary_path.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let (out, err, status) = tokio::join!(drain(stdout), drain(stderr), child.wait());
            Ok::<_, std::io::Error>((status?, out?, err?))
        };

        let outcome = tokio::time::timeout(request.deadline, run).await;
        let (status, out, err) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill external tool after deadline");
                }
                warn!(
                    binary = %self.binary_path.display(),
                    deadline = ?request.deadline,
                    "external tool exceeded its deadline"
                );
                return Err(ProcessError::TimedOut {
                    after: request.deadline,
                }
                .into());
            }
        };

        let stdout = String::from_utf8_lossy(&out).into_owned();
        let stderr = String::from_utf8_lossy(&err).into_owned();

        if !status.success() {
            warn!(
                binary = %self.binary_path.display(),
                code = ?status.code(),
                "external tool failed"
            );
            return Err(ProcessError::Failed {
                exit_code: status.code(),
                stdout_tail: tail_chars(&stdout, self.tail_chars),
                stderr_tail: tail_chars(&stderr, self.tail_chars),
            }
            .into());
        }

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout_bytes = out.len(),
            "external tool finished"
        );

        Ok(ProcessOutput { stdout, stderr })
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
