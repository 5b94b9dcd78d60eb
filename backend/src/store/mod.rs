//! Access to the relational store that receives uploads.
//!
//! The pipeline only talks to the store through the `Store` trait, a narrow
//! capability set: probe/create a target table, insert one batch, and
//! read/write the `upload_history` table. Two adapters implement it:
//!
//! - `sqlite::SqliteStore`: a local SQLite database, used for single-machine
//!   deployments and throughout the tests.
//! - `rest::RestStore`: a hosted Postgres behind a PostgREST-compatible HTTP API.
//!
//! Adapters translate their native failures into `StoreError` at the boundary so
//! the pipeline never inspects driver-specific error payloads.

pub mod rest;
pub mod sqlite;

use crate::config::StoreSettings;
use crate::ingest::coerce::CoercedRecord;
use async_trait::async_trait;
use common::model::column::ColumnTypeMap;
use common::model::datasource::DataSourceTag;
use common::model::history::{NewUploadRecord, UploadRecord};
use std::sync::Arc;
use thiserror::Error;

pub const HISTORY_TABLE: &str = "upload_history";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("table '{0}' does not exist")]
    MissingTable(String),
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("store unreachable: {0}")]
    Transport(String),
    #[error("store rejected the request ({}): {message}", .code.as_deref().unwrap_or("no code"))]
    Rejected {
        code: Option<String>,
        message: String,
    },
    #[error("could not decode store response: {0}")]
    Decode(String),
    #[error("unexpected store error: {0}")]
    Unexpected(String),
}

/// Result of probing for a target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Exists,
    Missing,
}

/// Filter for the content-hash lookup of the duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashLookup {
    /// Only records of this data source.
    Source(DataSourceTag),
    Any,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn table_status(&self, table: &str) -> Result<TableStatus, StoreError>;

    /// Creates `table` with an id column, one column per entry of `columns`
    /// and a `created_at` timestamp. Succeeds if the table already exists.
    async fn create_table(&self, table: &str, columns: &ColumnTypeMap) -> Result<(), StoreError>;

    /// Inserts all rows or none of them.
    async fn insert_batch(&self, table: &str, rows: &[CoercedRecord]) -> Result<(), StoreError>;

    /// Creates `upload_history` and its indexes if absent.
    async fn setup_history(&self) -> Result<(), StoreError>;

    /// Oldest history record with this content hash.
    async fn find_by_hash(
        &self,
        file_hash: &str,
        lookup: HashLookup,
    ) -> Result<Option<UploadRecord>, StoreError>;

    /// Oldest history record with this file name, any source.
    async fn find_by_filename(&self, filename: &str) -> Result<Option<UploadRecord>, StoreError>;

    async fn insert_history(&self, record: NewUploadRecord) -> Result<UploadRecord, StoreError>;

    /// Deletes records matching the (hash, source, filename) triple exactly.
    async fn delete_history(
        &self,
        file_hash: &str,
        data_source: DataSourceTag,
        filename: &str,
    ) -> Result<usize, StoreError>;

    /// Deletes records of uploads that inserted nothing.
    async fn delete_empty_history(&self) -> Result<usize, StoreError>;
}

/// Opens the store described by the configuration.
pub fn connect(settings: &StoreSettings) -> Result<Arc<dyn Store>, StoreError> {
    match settings {
        StoreSettings::Sqlite { path } => {
            let store = if path == ":memory:" {
                sqlite::SqliteStore::open_in_memory()?
            } else {
                sqlite::SqliteStore::open(path)?
            };
            Ok(Arc::new(store))
        }
        StoreSettings::Rest { base_url, api_key } => {
            Ok(Arc::new(rest::RestStore::new(base_url, api_key)?))
        }
    }
}
