//! Test doubles for the ingest pipeline.

use crate::ingest::coerce::CoercedRecord;
use crate::ingest::identifiers::normalize_header;
use crate::ingest::parse::{parse_dataset, ParsedDataset};
use crate::store::sqlite::SqliteStore;
use crate::store::{HashLookup, Store, StoreError, TableStatus};
use async_trait::async_trait;
use common::model::column::ColumnTypeMap;
use common::model::datasource::DataSourceTag;
use common::model::history::{NewUploadRecord, UploadRecord};
use std::sync::Mutex;

/// CSV text with `rows` order lines: `order_id,sku,qty`.
pub(crate) fn csv_with_rows(rows: usize) -> String {
    let mut text = String::from("Order ID,SKU,Qty\n");
    for i in 0..rows {
        text.push_str(&format!("{},SKU-{},{}\n", 1000 + i, i, i % 5 + 1));
    }
    text
}

pub(crate) fn dataset_with_rows(rows: usize) -> ParsedDataset {
    parse_dataset(&csv_with_rows(rows), "orders.csv", normalize_header)
        .expect("generated csv parses")
}

/// In-memory SQLite store that records every call and can fail a given batch.
pub(crate) struct RecordingStore {
    inner: SqliteStore,
    calls: Mutex<Vec<&'static str>>,
    batch_sizes: Mutex<Vec<usize>>,
    fail_on_batch: Option<usize>,
    fail_history: bool,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        RecordingStore {
            inner: SqliteStore::open_in_memory().expect("in-memory sqlite"),
            calls: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
            fail_on_batch: None,
            fail_history: false,
        }
    }

    /// Fails the `n`th insert_batch call (1-based).
    pub(crate) fn failing_on_batch(n: usize) -> Self {
        RecordingStore {
            fail_on_batch: Some(n),
            ..Self::new()
        }
    }

    /// Fails every history write and delete.
    pub(crate) fn failing_history() -> Self {
        RecordingStore {
            fail_history: true,
            ..Self::new()
        }
    }

    pub(crate) fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub(crate) async fn row_count(&self, table: &str) -> i64 {
        self.inner
            .query_i64(&format!("SELECT COUNT(*) FROM \"{}\"", table))
            .await
            .unwrap()
    }

    pub(crate) async fn null_count(&self, table: &str, column: &str) -> i64 {
        self.inner
            .query_i64(&format!(
                "SELECT COUNT(*) FROM \"{}\" WHERE \"{}\" IS NULL",
                table, column
            ))
            .await
            .unwrap()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn history_guard(&self) -> Result<(), StoreError> {
        if self.fail_history {
            Err(StoreError::Transport("history unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn table_status(&self, table: &str) -> Result<TableStatus, StoreError> {
        self.record("table_status");
        self.inner.table_status(table).await
    }

    async fn create_table(&self, table: &str, columns: &ColumnTypeMap) -> Result<(), StoreError> {
        self.record("create_table");
        self.inner.create_table(table, columns).await
    }

    async fn insert_batch(&self, table: &str, rows: &[CoercedRecord]) -> Result<(), StoreError> {
        self.record("insert_batch");
        let attempt = {
            let mut sizes = self.batch_sizes.lock().unwrap();
            sizes.push(rows.len());
            sizes.len()
        };
        if self.fail_on_batch == Some(attempt) {
            return Err(StoreError::Constraint(format!(
                "simulated failure on attempt {}",
                attempt
            )));
        }
        self.inner.insert_batch(table, rows).await
    }

    async fn setup_history(&self) -> Result<(), StoreError> {
        self.record("setup_history");
        self.inner.setup_history().await
    }

    async fn find_by_hash(
        &self,
        file_hash: &str,
        lookup: HashLookup,
    ) -> Result<Option<UploadRecord>, StoreError> {
        self.record("find_by_hash");
        self.inner.find_by_hash(file_hash, lookup).await
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Option<UploadRecord>, StoreError> {
        self.record("find_by_filename");
        self.inner.find_by_filename(filename).await
    }

    async fn insert_history(&self, record: NewUploadRecord) -> Result<UploadRecord, StoreError> {
        self.record("insert_history");
        self.history_guard()?;
        self.inner.insert_history(record).await
    }

    async fn delete_history(
        &self,
        file_hash: &str,
        data_source: DataSourceTag,
        filename: &str,
    ) -> Result<usize, StoreError> {
        self.record("delete_history");
        self.history_guard()?;
        self.inner.delete_history(file_hash, data_source, filename).await
    }

    async fn delete_empty_history(&self) -> Result<usize, StoreError> {
        self.record("delete_empty_history");
        self.inner.delete_empty_history().await
    }
}
