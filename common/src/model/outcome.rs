use crate::model::column::ColumnTypeMap;
use crate::model::history::UploadRecord;
use serde::{Deserialize, Serialize};

/// Which identity of an earlier upload matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKind {
    /// Same file bytes.
    Content,
    /// Same file name, possibly from another data source.
    Filename,
}

/// An earlier upload that looks like the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    #[serde(rename = "type")]
    pub kind: DuplicateKind,
    pub record: UploadRecord,
}

/// Summary returned to the client once an upload has been processed.
///
/// `success` means every row went in, `partial_success` means some batches were
/// committed before one failed. When nothing was inserted both flags are false and
/// `errors` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub partial_success: bool,
    pub message: String,
    pub total_rows: usize,
    pub inserted_rows: usize,
    pub failed_rows: usize,
    pub errors: Vec<String>,
    pub columns: Vec<String>,
    pub table_name: String,
    pub column_types: ColumnTypeMap,
    /// Advisory only, the upload was processed regardless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<DuplicateMatch>,
}

impl UploadOutcome {
    pub fn new(
        total_rows: usize,
        inserted_rows: usize,
        errors: Vec<String>,
        columns: Vec<String>,
        table_name: String,
        column_types: ColumnTypeMap,
    ) -> Self {
        let success = errors.is_empty() && inserted_rows > 0;
        let partial_success = !errors.is_empty() && inserted_rows > 0;
        let message = if success {
            format!("Successfully processed {} records", inserted_rows)
        } else if partial_success {
            format!(
                "Inserted {} of {} records before a batch failed",
                inserted_rows, total_rows
            )
        } else {
            "No records were inserted".to_string()
        };

        UploadOutcome {
            success,
            partial_success,
            message,
            total_rows,
            inserted_rows,
            failed_rows: total_rows.saturating_sub(inserted_rows),
            errors,
            columns,
            table_name,
            column_types,
            duplicate: None,
        }
    }
}
