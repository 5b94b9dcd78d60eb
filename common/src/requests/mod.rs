use crate::model::datasource::DataSourceTag;
use crate::model::outcome::{DuplicateKind, DuplicateMatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request payload for `POST /api/check-duplicate`.
///
/// Fields are optional so the handler can answer a missing field with a 400
/// instead of a deserialization error.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CheckDuplicateRequest {
    pub content_hash: Option<String>,
    pub file_name: Option<String>,
    pub data_source: Option<String>,
}

/// Response of `POST /api/check-duplicate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDuplicateResponse {
    pub is_duplicate: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<DuplicateKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSourceTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<i64>,
}

impl From<Option<DuplicateMatch>> for CheckDuplicateResponse {
    fn from(found: Option<DuplicateMatch>) -> Self {
        match found {
            Some(DuplicateMatch { kind, record }) => CheckDuplicateResponse {
                is_duplicate: true,
                kind: Some(kind),
                upload_date: Some(record.upload_date),
                original_filename: Some(record.original_filename),
                data_source: Some(record.data_source),
                upload_id: Some(record.id),
            },
            None => CheckDuplicateResponse {
                is_duplicate: false,
                kind: None,
                upload_date: None,
                original_filename: None,
                data_source: None,
                upload_id: None,
            },
        }
    }
}

/// Request payload for `POST /api/auth/login`.
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
