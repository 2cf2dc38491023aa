//! Shared test helpers for creating ArtifactBroker instances in tests.

use crate::config::Config;
use crate::error::ProcessError;
use crate::invoker::{InvokeRequest, ProcessOutput, Transformer};
use crate::types::Upload;
use crate::utils::default_backup_path;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use super::{ArtifactBroker, ArtifactDownload};

/// What the in-process transformer does when invoked
#[derive(Clone, Debug)]
pub(crate) enum StubBehavior {
    /// Rewrite the input in place, optionally writing a backup next to it
    Succeed { backup: bool },
    /// Succeed but report a backup outside the workspace
    ReportForeignBackup,
    /// Exit non-zero with the given stderr
    Fail { stderr: String },
    /// Exceed the deadline
    TimeOut,
    /// Sleep before succeeding, for shutdown and cancellation tests
    Slow { delay: Duration },
}

/// Transformer stub that mimics the external tool's file effects
pub(crate) struct StubTransformer {
    pub(crate) behavior: StubBehavior,
    pub(crate) calls: Mutex<Vec<InvokeRequest>>,
}

impl StubTransformer {
    pub(crate) fn new(behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<InvokeRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transformer for StubTransformer {
    async fn invoke(&self, request: InvokeRequest) -> crate::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(request.clone());

        match &self.behavior {
            StubBehavior::Succeed { backup } => {
                let original = tokio::fs::read(&request.input_path).await?;
                let mut adjusted = b"adjusted:".to_vec();
                adjusted.extend_from_slice(&original);
                tokio::fs::write(&request.input_path, adjusted).await?;

                let mut stdout = String::from("OK\nlinhas: 3\n");
                let no_backup = request.args.iter().any(|a| a == "--no-backup");
                if *backup && !no_backup {
                    let backup_path = default_backup_path(&request.input_path, ".backup");
                    tokio::fs::write(&backup_path, &original).await?;
                    stdout.push_str(&format!("backup_path: {}\n", backup_path.display()));
                }

                Ok(ProcessOutput {
                    stdout,
                    stderr: String::new(),
                })
            }
            StubBehavior::ReportForeignBackup => Ok(ProcessOutput {
                stdout: "OK\nbackup_path: /etc/passwd\n".to_string(),
                stderr: String::new(),
            }),
            StubBehavior::Fail { stderr } => Err(ProcessError::Failed {
                exit_code: Some(2),
                stdout_tail: String::new(),
                stderr_tail: stderr.clone(),
            }
            .into()),
            StubBehavior::TimeOut => Err(ProcessError::TimedOut {
                after: request.deadline,
            }
            .into()),
            StubBehavior::Slow { delay } => {
                tokio::time::sleep(*delay).await;
                Ok(ProcessOutput::default())
            }
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Configuration rooted in `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.work_dir = dir.join("work");
    config.tool.binary_path = dir.join("bin/tool");
    config
}

/// Helper to create a broker backed by a stub transformer.
/// Returns the broker, the stub and the tempdir (which must be kept alive).
pub(crate) async fn create_test_broker(
    behavior: StubBehavior,
) -> (ArtifactBroker, Arc<StubTransformer>, TempDir) {
    create_test_broker_with(behavior, |_| {}).await
}

/// Like [`create_test_broker`], with a hook to adjust the configuration
pub(crate) async fn create_test_broker_with(
    behavior: StubBehavior,
    adjust: impl FnOnce(&mut Config),
) -> (ArtifactBroker, Arc<StubTransformer>, TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    adjust(&mut config);

    let stub = StubTransformer::new(behavior);
    let broker = ArtifactBroker::with_transformer(config, stub.clone())
        .await
        .unwrap();

    (broker, stub, temp_dir)
}

/// An upload with the given client filename
pub(crate) fn upload(filename: &str, content: &[u8]) -> Upload {
    Upload {
        filename: Some(filename.to_string()),
        content: content.to_vec(),
    }
}

/// Read a download to the end
pub(crate) async fn collect(download: ArtifactDownload) -> Vec<u8> {
    let mut body = download.body;
    let mut data = Vec::new();
    while let Some(chunk) = body.next().await {
        data.extend_from_slice(&chunk.unwrap());
    }
    data
}

/// Number of job directories left under the work root
pub(crate) fn workspace_count(broker: &ArtifactBroker) -> usize {
    std::fs::read_dir(broker.workspaces.root())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

/// Wait until the work root holds `expected` directories
pub(crate) async fn wait_for_workspaces(broker: &ArtifactBroker, expected: usize) {
    for _ in 0..200 {
        if workspace_count(broker) == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(workspace_count(broker), expected, "workspace count never settled");
}
