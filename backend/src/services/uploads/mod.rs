//! # Upload Service Module
//!
//! HTTP endpoints of the CSV upload pipeline, all under `/api`.
//!
//! ## Sub-modules:
//! - `upload`: receives a multipart upload and runs it through the ingest pipeline.
//! - `check_duplicate`: tells the client whether a file was uploaded before.
//! - `setup`: creates the `upload_history` table.
//! - `cleanup`: removes history records of uploads that inserted nothing.

mod check_duplicate;
mod cleanup;
mod setup;
mod upload;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api";

/// Configures and returns the Actix `Scope` for the upload routes.
///
/// The scope claims every path under `/api`, so it has to be registered after any
/// more specific `/api/...` scope.
///
/// # Registered Routes:
///
/// *   **`POST /upload`**: multipart form with `file`, `table_name`, and optionally
///     `data_source`, `file_name` and `content_hash`. Answers with an `UploadOutcome`.
/// *   **`POST /check-duplicate`**: JSON `{content_hash, file_name, data_source}`.
/// *   **`POST /setup-tables`**
/// *   **`POST /cleanup-failed-uploads`**
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/upload", post().to(upload::process))
        .route("/check-duplicate", post().to(check_duplicate::process))
        .route("/setup-tables", post().to(setup::process))
        .route("/cleanup-failed-uploads", post().to(cleanup::process))
}
