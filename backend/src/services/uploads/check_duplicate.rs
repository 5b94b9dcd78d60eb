use crate::error::UploadError;
use crate::ingest::duplicates::find_duplicate;
use crate::state::AppState;
use actix_web::{web, HttpResponse, ResponseError};
use common::model::datasource::DataSourceTag;
use common::requests::{CheckDuplicateRequest, CheckDuplicateResponse};

pub async fn process(
    state: web::Data<AppState>,
    payload: web::Json<CheckDuplicateRequest>,
) -> HttpResponse {
    match check_duplicate(&state, payload.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => e.error_response(),
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn check_duplicate(
    state: &AppState,
    request: CheckDuplicateRequest,
) -> Result<CheckDuplicateResponse, UploadError> {
    let (Some(hash), Some(file_name), Some(source)) = (
        required(request.content_hash),
        required(request.file_name),
        required(request.data_source),
    ) else {
        return Err(UploadError::validation("Missing required parameters"));
    };
    let source = source
        .parse::<DataSourceTag>()
        .map_err(|e| UploadError::validation(e.to_string()))?;

    let found = find_duplicate(
        state.store.as_ref(),
        state.config.ingest.duplicate_scope,
        &hash.trim().to_ascii_lowercase(),
        file_name.trim(),
        source,
    )
    .await?;
    Ok(found.into())
}
