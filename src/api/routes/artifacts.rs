//! One-shot artifact download handlers.

use crate::api::AppState;
use crate::broker::ArtifactDownload;
use crate::error::ApiError;
use crate::types::{ArtifactKind, JobId};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// GET /download/primary/:id - Download the transformed file
#[utoipa::path(
    get,
    path = "/download/primary/{id}",
    tag = "artifacts",
    params(
        ("id" = String, Path, description = "Job identifier from the process response")
    ),
    responses(
        (status = 200, description = "Transformed file", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown, expired or already downloaded", body = ApiError)
    )
)]
pub async fn download_primary(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    download(state, id, ArtifactKind::Primary).await
}

/// GET /download/secondary/:id - Download the backup copy
#[utoipa::path(
    get,
    path = "/download/secondary/{id}",
    tag = "artifacts",
    params(
        ("id" = String, Path, description = "Job identifier from the process response")
    ),
    responses(
        (status = 200, description = "Backup of the original upload", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown, expired, never produced or already downloaded", body = ApiError)
    )
)]
pub async fn download_secondary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    download(state, id, ArtifactKind::Secondary).await
}

async fn download(state: AppState, id: String, kind: ArtifactKind) -> Response {
    let job_id = JobId::from(id.as_str());

    match state.broker.serve(&job_id, kind).await {
        Ok(download) => into_streaming_response(download),
        Err(e) => e.into_response(),
    }
}

fn into_streaming_response(download: ArtifactDownload) -> Response {
    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&download.content_disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(download.len)),
        ],
        Body::from_stream(download.body),
    )
        .into_response()
}
