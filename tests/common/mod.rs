//! Common test utilities for artifact-broker integration tests
//!
//! Builds a broker around a real shell script standing in for the external
//! tool, and drives it through the HTTP router.

#![allow(dead_code)]

use artifact_broker::{ArtifactBroker, Config};
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Script mimicking the spreadsheet tool: keeps a backup unless
/// `--no-backup` is passed, rewrites the input and prints a summary.
pub const ADJUSTING_TOOL: &str = r#"
input="$1"; shift
backup="${input%.xlsx}.backup.xlsx"
want_backup=1
for arg in "$@"; do
  if [ "$arg" = "--no-backup" ]; then want_backup=0; else sheet="$arg"; fi
done
if [ "$want_backup" = 1 ]; then cp "$input" "$backup"; fi
printf 'adjusted' > "$input"
echo "OK"
echo "linhas: 2"
echo "aba: ${sheet:-all}"
if [ "$want_backup" = 1 ]; then echo "backup_path: $backup"; fi
"#;

pub const BOUNDARY: &str = "integration-boundary";

/// Write an executable `/bin/sh` script into `dir`
pub fn write_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("tool.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Broker plus router running `script` as the external tool
pub struct Harness {
    pub broker: ArtifactBroker,
    pub router: Router,
    pub work_dir: PathBuf,
    _temp_dir: TempDir,
}

impl Harness {
    pub async fn new(script: &str) -> Self {
        Self::with_config(script, |_| {}).await
    }

    pub async fn with_config(script: &str, adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.tool.binary_path = write_tool(temp_dir.path(), script);
        config.tool.timeout = Duration::from_secs(10);
        config.storage.work_dir = temp_dir.path().join("work");
        adjust(&mut config);

        let broker = ArtifactBroker::new(config).await.unwrap();
        let router = artifact_broker::api::create_router(broker.clone());
        let work_dir = temp_dir.path().join("work");

        Self {
            broker,
            router,
            work_dir,
            _temp_dir: temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Number of job directories under the work root
    pub fn workspace_count(&self) -> usize {
        std::fs::read_dir(&self.work_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Wait until the work root holds `expected` directories
    pub async fn wait_for_workspaces(&self, expected: usize) {
        for _ in 0..200 {
            if self.workspace_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(self.workspace_count(), expected, "workspace count never settled");
    }
}

/// `POST /process` with a file part and optional text fields
pub fn process_request(filename: &str, content: &[u8], fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/process")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
