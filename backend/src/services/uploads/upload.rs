use crate::error::UploadError;
use crate::ingest::orchestrator::{run_upload, too_large, UploadRequest};
use crate::state::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse, ResponseError};
use common::model::datasource::DataSourceTag;
use futures_util::StreamExt;
use log::warn;

/// Text form fields are short; anything longer is not a valid request.
const TEXT_FIELD_LIMIT: usize = 4 * 1024;

/// HTTP handler wrapper that converts the pipeline result to an `HttpResponse`.
///
/// - Rows inserted (all or some): `200 OK` with the `UploadOutcome`.
/// - Nothing inserted because the store refused the data: `500` with the `UploadOutcome`.
/// - Request or pipeline error: the status chosen by `UploadError`.
pub async fn process(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let result = match read_request(payload, state.config.ingest.max_upload_bytes).await {
        Ok(request) => run_upload(state.store.as_ref(), &state.config.ingest, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) if outcome.inserted_rows == 0 && !outcome.errors.is_empty() => {
            HttpResponse::InternalServerError().json(outcome)
        }
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => {
            warn!("Upload rejected: {}", e);
            e.error_response()
        }
    }
}

async fn read_limited<F>(field: &mut Field, limit: usize, too_big: F) -> Result<Vec<u8>, UploadError>
where
    F: Fn() -> UploadError,
{
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadError::Unexpected(format!("Failed to read upload: {}", e)))?;
        if bytes.len() + chunk.len() > limit {
            return Err(too_big());
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_text(field: &mut Field, name: &str) -> Result<String, UploadError> {
    let bytes = read_limited(field, TEXT_FIELD_LIMIT, || {
        UploadError::validation(format!("Form field '{}' is too long", name))
    })
    .await?;
    String::from_utf8(bytes)
        .map_err(|_| UploadError::validation(format!("Form field '{}' is not valid UTF-8", name)))
}

/// Collects the multipart form into an `UploadRequest`.
///
/// The file is buffered in memory, up to `max_file_bytes`.
async fn read_request(mut payload: Multipart, max_file_bytes: usize) -> Result<UploadRequest, UploadError> {
    let mut request = UploadRequest::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| UploadError::validation(format!("Invalid form data: {}", e)))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match name.as_deref() {
            Some("file") => {
                request.upload_filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()));
                let bytes = read_limited(&mut field, max_file_bytes, || too_large(max_file_bytes)).await?;
                request.file = Some(bytes);
            }
            Some("table_name") => request.table_name = Some(read_text(&mut field, "table_name").await?),
            Some("file_name") => request.file_name = Some(read_text(&mut field, "file_name").await?),
            Some("content_hash") => {
                request.content_hash = Some(read_text(&mut field, "content_hash").await?)
            }
            Some("data_source") => {
                let raw = read_text(&mut field, "data_source").await?;
                if !raw.trim().is_empty() {
                    let tag = raw
                        .parse::<DataSourceTag>()
                        .map_err(|e| UploadError::validation(e.to_string()))?;
                    request.data_source = Some(tag);
                }
            }
            other => {
                warn!("Ignoring unexpected form field {:?}", other);
                read_limited(&mut field, max_file_bytes, || too_large(max_file_bytes)).await?;
            }
        }
    }

    Ok(request)
}
