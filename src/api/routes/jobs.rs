//! Job submission handler.

use crate::api::AppState;
use crate::error::{ApiError, Error};
use crate::types::{JobOptions, ProcessResponse, Upload};
use crate::utils::parse_bool_default_true;
use axum::{
    Json,
    extract::{Multipart, State},
    response::{IntoResponse, Response},
};

/// Fields collected from the multipart form
#[derive(Default)]
struct ProcessFields {
    upload: Option<Upload>,
    sheet: Option<String>,
    create_backup: Option<String>,
}

/// Read the form, accepting each field under its English or legacy name
async fn read_fields(mut multipart: Multipart) -> Result<ProcessFields, Error> {
    let mut fields = ProcessFields::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(Error::Validation(format!("invalid multipart body: {e}"))),
        };
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" | "arquivo" => {
                let filename = field.file_name().map(str::to_string);
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(format!("failed to read uploaded file: {e}")))?;
                fields.upload = Some(Upload {
                    filename,
                    content: content.to_vec(),
                });
            }
            "sheet" | "aba" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("invalid '{name}' field: {e}")))?;
                fields.sheet = Some(text);
            }
            "create_backup" | "criar_backup" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("invalid '{name}' field: {e}")))?;
                fields.create_backup = Some(text);
            }
            _ => {
                tracing::debug!(field = %name, "ignoring unknown form field");
            }
        }
    }

    Ok(fields)
}

/// POST /process - Upload a spreadsheet and run the tool on it
#[utoipa::path(
    post,
    path = "/process",
    tag = "jobs",
    request_body(content = crate::api::routes::ProcessForm, description = "Spreadsheet upload with options", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Tool finished; artifacts ready for download", body = ProcessResponse),
        (status = 400, description = "Malformed form or missing file", body = ApiError),
        (status = 500, description = "Tool missing or failed; includes output tails", body = ApiError),
        (status = 503, description = "Server shutting down", body = ApiError),
        (status = 504, description = "Tool exceeded its deadline", body = ApiError)
    )
)]
pub async fn process_job(State(state): State<AppState>, multipart: Multipart) -> Response {
    let fields = match read_fields(multipart).await {
        Ok(fields) => fields,
        Err(e) => return e.into_response(),
    };

    let Some(upload) = fields.upload else {
        return Error::Validation("missing 'file' field".into()).into_response();
    };

    let options = JobOptions {
        sheet: fields.sheet.filter(|s| !s.trim().is_empty()),
        create_backup: fields
            .create_backup
            .as_deref()
            .is_none_or(parse_bool_default_true),
    };

    match state.broker.submit(upload, options).await {
        Ok(receipt) => {
            let response = ProcessResponse::from_receipt(receipt, &state.config.api.url_prefix);
            Json(response).into_response()
        }
        Err(e) => e.into_response(),
    }
}
