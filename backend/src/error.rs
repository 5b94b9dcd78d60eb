//! Errors that end a request, and how they are rendered.

use crate::ingest::parse::ParseError;
use crate::store::StoreError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    /// The request itself is unusable: missing fields, bad file, rejected content.
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Unexpected(String),
}

impl UploadError {
    pub fn validation(message: impl Into<String>) -> Self {
        UploadError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Vec<String>) -> Self {
        UploadError::Validation {
            message: message.into(),
            details,
        }
    }
}

impl ResponseError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::Validation { .. } | UploadError::Parse(_) => StatusCode::BAD_REQUEST,
            UploadError::Store(_) | UploadError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            UploadError::Validation { message, details } if details.is_empty() => {
                json!({ "error": message })
            }
            UploadError::Validation { message, details } => {
                json!({ "error": message, "details": details })
            }
            UploadError::Parse(e) => json!({ "error": e.to_string() }),
            UploadError::Store(e) => json!({ "error": "Internal server error", "details": e.to_string() }),
            UploadError::Unexpected(e) => json!({ "error": "Internal server error", "details": e }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
