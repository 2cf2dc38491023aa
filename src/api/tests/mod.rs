use super::*;
use crate::Config;
use crate::broker::test_helpers::{
    StubBehavior, StubTransformer, create_test_broker, create_test_broker_with,
};
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

mod system;

const BOUNDARY: &str = "broker-test-boundary";

/// One part of a multipart form
struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content: &'a [u8],
}

fn field<'a>(name: &'a str, value: &'a str) -> Part<'a> {
    Part {
        name,
        filename: None,
        content: value.as_bytes(),
    }
}

fn file<'a>(name: &'a str, filename: &'a str, content: &'a [u8]) -> Part<'a> {
    Part {
        name,
        filename: Some(filename),
        content,
    }
}

/// Encode parts as a `multipart/form-data` body
fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn process_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Router plus the broker behind it
struct TestApp {
    router: Router,
    broker: ArtifactBroker,
    stub: Arc<StubTransformer>,
    _temp_dir: TempDir,
}

impl TestApp {
    async fn new(behavior: StubBehavior) -> Self {
        let (broker, stub, temp_dir) = create_test_broker(behavior).await;
        Self::wrap(broker, stub, temp_dir)
    }

    async fn with_config(behavior: StubBehavior, adjust: impl FnOnce(&mut Config)) -> Self {
        let (broker, stub, temp_dir) = create_test_broker_with(behavior, adjust).await;
        Self::wrap(broker, stub, temp_dir)
    }

    fn wrap(broker: ArtifactBroker, stub: Arc<StubTransformer>, temp_dir: TempDir) -> Self {
        Self {
            router: create_router(broker.clone()),
            broker,
            stub,
            _temp_dir: temp_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Submit `content` as `diario.xlsx` and return the JSON response
    async fn process(&self, content: &[u8]) -> serde_json::Value {
        let response = self
            .send(process_request(&[file("file", "diario.xlsx", content)]))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn json_body(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_api_server_serves_until_shutdown() {
    let (broker, _stub, _temp_dir) = create_test_broker(StubBehavior::Succeed { backup: false }).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = tokio::spawn(serve(broker.clone(), listener));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!server.is_finished());

    broker.shutdown().await.unwrap();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("server did not stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let app = TestApp::new(StubBehavior::Succeed { backup: false }).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
}

#[tokio::test]
async fn test_cors_specific_origins() {
    let app = TestApp::with_config(StubBehavior::Succeed { backup: false }, |config| {
        config.api.cors_origins = vec!["http://allowed.example".to_string()];
    })
    .await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("http://allowed.example")
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let app = TestApp::with_config(StubBehavior::Succeed { backup: false }, |config| {
        config.api.cors_enabled = false;
    })
    .await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_every_response_disables_content_sniffing() {
    let app = TestApp::new(StubBehavior::Succeed { backup: false }).await;

    for uri in ["/health", "/download/primary/unknown", "/openapi.json"] {
        let response = app.send(get(uri)).await;
        assert_eq!(
            header(&response, "x-content-type-options"),
            Some("nosniff"),
            "missing nosniff on {uri}"
        );
    }
}
