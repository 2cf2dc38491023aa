//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI document for the artifact-broker REST API using
//! utoipa for compile-time document generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the artifact-broker REST API
///
/// The document can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (when enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "artifact-broker REST API",
        version = "0.1.0",
        description = "Upload a spreadsheet, run the processing tool on it and fetch the results once through short-lived download links",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8002", description = "Local development server")
    ),
    paths(
        crate::api::routes::process_job,
        crate::api::routes::download_primary,
        crate::api::routes::download_secondary,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::ArtifactKind,
        crate::types::ProcessResponse,

        crate::config::Config,
        crate::config::ToolConfig,
        crate::config::StorageConfig,
        crate::config::RetentionConfig,
        crate::config::ApiConfig,

        crate::api::routes::ProcessForm,
        crate::api::routes::HealthResponse,

        crate::error::ApiError,
    )),
    tags(
        (name = "jobs", description = "Job submission - Upload a file and run the processing tool"),
        (name = "artifacts", description = "One-shot downloads of the files a job produced"),
        (name = "system", description = "System endpoints - Health check and OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_lists_every_route() {
        let spec = ApiDoc::openapi();

        for path in [
            "/process",
            "/download/primary/{id}",
            "/download/secondary/{id}",
            "/health",
            "/openapi.json",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components defined");

        for schema in ["ProcessResponse", "ApiError", "HealthResponse", "ProcessForm"] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {schema}"
            );
        }
    }

    #[test]
    fn test_openapi_spec_has_tags() {
        let spec = ApiDoc::openapi();
        let tags = spec.tags.expect("tags defined");

        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["jobs", "artifacts", "system"]);
    }

    #[test]
    fn test_openapi_json_serialization() {
        let spec = ApiDoc::openapi();

        let json = serde_json::to_value(&spec).expect("Should serialize to JSON");
        assert_eq!(json["info"]["title"], "artifact-broker REST API");
        assert!(
            json["openapi"].as_str().unwrap().starts_with("3."),
            "Should use OpenAPI 3.x version"
        );
    }
}
