//! Batched insertion of a parsed dataset.
//!
//! Batches go out strictly one after another. The first failing batch ends the run:
//! earlier batches stay committed and later ones are never sent. There is no
//! transaction spanning batches.

use crate::ingest::coerce::{coerce_record, CoercedRecord};
use crate::ingest::parse::ParsedDataset;
use crate::store::Store;
use common::model::column::ColumnTypeMap;
use log::{debug, warn};

pub const BATCH_SIZE: usize = 100;

/// What happened while inserting.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub inserted_rows: usize,
    pub batches_attempted: usize,
    /// At most one entry: the batch that stopped the run.
    pub errors: Vec<String>,
}

pub fn batch_count(rows: usize) -> usize {
    rows.div_ceil(BATCH_SIZE)
}

pub async fn insert_batches(
    store: &dyn Store,
    table: &str,
    dataset: &ParsedDataset,
    types: &ColumnTypeMap,
) -> BatchReport {
    let total = batch_count(dataset.records.len());
    let mut report = BatchReport::default();

    for (index, chunk) in dataset.records.chunks(BATCH_SIZE).enumerate() {
        let rows: Vec<CoercedRecord> = chunk
            .iter()
            .map(|record| coerce_record(record, types))
            .collect();
        report.batches_attempted += 1;

        match store.insert_batch(table, &rows).await {
            Ok(()) => {
                report.inserted_rows += rows.len();
                debug!(
                    "Inserted batch {}/{} into {} ({} rows)",
                    index + 1,
                    total,
                    table,
                    rows.len()
                );
            }
            Err(err) => {
                warn!(
                    "Batch {}/{} into {} failed, {} rows already committed: {}",
                    index + 1,
                    total,
                    table,
                    report.inserted_rows,
                    err
                );
                report.errors.push(format!("Batch {}: {}", index + 1, err));
                break;
            }
        }
    }

    report
}
