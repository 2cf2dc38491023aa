//! REST API server module
//!
//! Exposes job submission and the two one-shot artifact downloads over HTTP,
//! together with a health check and the OpenAPI document.

use crate::{ArtifactBroker, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `POST /process` - Upload a spreadsheet and run the tool on it
/// - `GET /download/primary/:id` - Download the transformed file (once)
/// - `GET /download/secondary/:id` - Download the backup copy (once)
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(broker: ArtifactBroker) -> Router {
    let config = broker.config.clone();
    let state = AppState::new(broker);

    let router = Router::new()
        .route("/process", post(routes::process_job))
        .route("/download/primary/:id", get(routes::download_primary))
        .route("/download/secondary/:id", get(routes::download_secondary))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // SwaggerUi registers its own document route, so it must not reuse /openapi.json
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.api.max_upload_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin; otherwise only the listed
/// origins are allowed. Methods and headers are always unrestricted.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the broker shuts down; in-flight requests are allowed to
/// finish before this returns.
///
/// # Example
///
/// ```no_run
/// use artifact_broker::{ArtifactBroker, Config};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = ArtifactBroker::new(Config::default()).await?;
///
/// // Start API server (blocks until shutdown)
/// artifact_broker::api::start_api_server(broker).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(broker: ArtifactBroker) -> Result<()> {
    let bind_address = broker.config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve(broker, listener).await
}

/// Serve the API on an already bound listener
pub async fn serve(broker: ArtifactBroker, listener: TcpListener) -> Result<()> {
    let shutdown = broker.shutdown_token();
    let app = create_router(broker);

    if let Ok(address) = listener.local_addr() {
        tracing::info!(address = %address, "API server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
