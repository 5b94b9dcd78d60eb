//! Bookkeeping of finished uploads.
//!
//! History is best effort: a failure here is logged and never changes the outcome
//! reported for the upload itself.

use crate::store::Store;
use chrono::Utc;
use common::model::datasource::DataSourceTag;
use common::model::history::NewUploadRecord;
use log::{info, warn};

/// The identity an upload is recorded under.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadIdentity {
    pub content_hash: String,
    pub filename: String,
    pub data_source: DataSourceTag,
}

/// What `record_upload` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Recorded,
    /// Number of stale records removed.
    Cleaned(usize),
    Failed,
}

/// Records a successful upload, or clears leftovers of an earlier failed one.
///
/// With rows inserted, one history record is added. With nothing inserted, records
/// matching the identity exactly are deleted.
pub async fn record_upload(
    store: &dyn Store,
    identity: &UploadIdentity,
    table_name: &str,
    inserted_rows: usize,
) -> HistoryAction {
    if inserted_rows > 0 {
        let record = NewUploadRecord {
            file_hash: identity.content_hash.clone(),
            original_filename: identity.filename.clone(),
            data_source: identity.data_source,
            table_name: table_name.to_string(),
            rows_inserted: i64::try_from(inserted_rows).unwrap_or(i64::MAX),
            upload_date: Utc::now(),
        };
        match store.insert_history(record).await {
            Ok(saved) => {
                info!(
                    "Recorded upload {} of '{}' ({} rows)",
                    saved.id, identity.filename, inserted_rows
                );
                HistoryAction::Recorded
            }
            Err(e) => {
                warn!("Failed to record upload history for '{}': {}", identity.filename, e);
                HistoryAction::Failed
            }
        }
    } else {
        match store
            .delete_history(&identity.content_hash, identity.data_source, &identity.filename)
            .await
        {
            Ok(removed) => {
                if removed > 0 {
                    info!(
                        "Removed {} stale history record(s) for '{}'",
                        removed, identity.filename
                    );
                }
                HistoryAction::Cleaned(removed)
            }
            Err(e) => {
                warn!("Failed to clean upload history for '{}': {}", identity.filename, e);
                HistoryAction::Failed
            }
        }
    }
}
