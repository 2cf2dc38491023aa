use super::*;

#[tokio::test]
async fn test_health_reports_live_jobs() {
    let app = TestApp::new(StubBehavior::Succeed { backup: true }).await;

    let response = app.send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["live_jobs"], 0);

    app.process(b"one").await;
    app.process(b"two").await;

    let body = json_body(app.send(get("/health")).await).await;
    assert_eq!(body["live_jobs"], 2);
}

#[tokio::test]
async fn test_openapi_endpoint() {
    let app = TestApp::new(StubBehavior::Succeed { backup: true }).await;

    let response = app.send(get("/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let spec = json_body(response).await;
    assert!(spec["openapi"].as_str().unwrap().starts_with("3."));
    assert!(spec["paths"]["/process"].is_object());
}

#[tokio::test]
async fn test_swagger_ui_disabled_by_default() {
    let app = TestApp::new(StubBehavior::Succeed { backup: true }).await;

    let response = app.send(get("/swagger-ui/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let app = TestApp::with_config(StubBehavior::Succeed { backup: true }, |config| {
        config.api.swagger_ui = true;
    })
    .await;

    let response = app.send(get("/api-docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let spec = json_body(response).await;
    assert_eq!(spec["info"]["title"], "artifact-broker REST API");

    // The plain document route keeps working alongside Swagger UI
    let response = app.send(get("/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
