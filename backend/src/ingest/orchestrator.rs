//! One upload, start to finish.
//!
//! 1. Check the request: file and table present, `.csv` name, size limit, table identifier.
//! 2. Parse the CSV and screen column names and cell contents.
//! 3. Ask the history for an earlier upload of the same file (advisory).
//! 4. Infer column types.
//! 5. Make sure the target table exists, per `TablePolicy`.
//! 6. Insert in batches, stopping at the first failing batch.
//! 7. Record or clean up upload history.
//!
//! Nothing here retries. Store failures before step 6 end the request; failures inside
//! step 6 are reported in the outcome.

use crate::config::{IngestSettings, TablePolicy};
use crate::error::UploadError;
use crate::ingest::batch::insert_batches;
use crate::ingest::content::{column_problems, content_hash, suspicious_cells};
use crate::ingest::duplicates::find_duplicate;
use crate::ingest::history::{record_upload, UploadIdentity};
use crate::ingest::identifiers::{is_valid_table_name, normalize_header};
use crate::ingest::infer::infer_column_types;
use crate::ingest::parse::{decode_text, parse_dataset};
use crate::store::{Store, TableStatus};
use common::model::column::ColumnTypeMap;
use common::model::datasource::DataSourceTag;
use common::model::outcome::UploadOutcome;
use log::{debug, info, warn};

/// Everything the client sent for one upload.
#[derive(Debug, Default, Clone)]
pub struct UploadRequest {
    pub file: Option<Vec<u8>>,
    /// Name from the multipart `Content-Disposition`, used when `file_name` is absent.
    pub upload_filename: Option<String>,
    pub table_name: Option<String>,
    pub file_name: Option<String>,
    pub data_source: Option<DataSourceTag>,
    /// Hash the client computed over the file the user picked.
    pub content_hash: Option<String>,
}

/// The rejection for files over `max_bytes`.
pub fn too_large(max_bytes: usize) -> UploadError {
    const MIB: usize = 1024 * 1024;
    let limit = if max_bytes % MIB == 0 {
        format!("{}MB", max_bytes / MIB)
    } else if max_bytes >= MIB {
        format!("{:.1}MB", max_bytes as f64 / MIB as f64)
    } else {
        format!("{} bytes", max_bytes)
    };
    UploadError::validation(format!(
        "File size too large. Maximum allowed size is {}",
        limit
    ))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn ensure_target_table(
    store: &dyn Store,
    policy: &TablePolicy,
    table: &str,
    types: &ColumnTypeMap,
) -> Result<(), UploadError> {
    match policy {
        TablePolicy::AllowList(allowed) => {
            if !allowed.iter().any(|t| t == table) {
                return Err(UploadError::validation_with(
                    format!("Table '{}' is not an allowed upload target", table),
                    allowed.clone(),
                ));
            }
            match store.table_status(table).await? {
                TableStatus::Exists => Ok(()),
                TableStatus::Missing => Err(UploadError::validation_with(
                    format!(
                        "Table '{}' does not exist; upload into one of the existing tables",
                        table
                    ),
                    allowed.clone(),
                )),
            }
        }
        TablePolicy::AutoCreate => match store.table_status(table).await? {
            TableStatus::Exists => Ok(()),
            TableStatus::Missing => {
                info!("Creating table {} with {} columns", table, types.len());
                store.create_table(table, types).await?;
                Ok(())
            }
        },
    }
}

pub async fn run_upload(
    store: &dyn Store,
    settings: &IngestSettings,
    request: UploadRequest,
) -> Result<UploadOutcome, UploadError> {
    let bytes = request
        .file
        .ok_or_else(|| UploadError::validation("No file provided"))?;
    let table = non_blank(request.table_name)
        .ok_or_else(|| UploadError::validation("No table name provided"))?;
    let filename = non_blank(request.file_name).or_else(|| non_blank(request.upload_filename));

    if let Some(name) = &filename {
        if !name.to_ascii_lowercase().ends_with(".csv") {
            return Err(UploadError::validation("The file must end with .csv"));
        }
    }
    if bytes.len() > settings.max_upload_bytes {
        return Err(too_large(settings.max_upload_bytes));
    }
    if !is_valid_table_name(&table) {
        return Err(UploadError::validation(format!("Invalid table name '{}'", table)));
    }

    let computed_hash = content_hash(&bytes);
    let hash = match non_blank(request.content_hash).map(|h| h.to_ascii_lowercase()) {
        Some(client_hash) => {
            if client_hash != computed_hash {
                debug!(
                    "Client hash {} differs from received bytes {}, keeping the client hash",
                    client_hash, computed_hash
                );
            }
            client_hash
        }
        None => computed_hash,
    };

    let text = decode_text(&bytes)?;
    let mut dataset = parse_dataset(text, filename.as_deref().unwrap_or_default(), normalize_header)?;
    dataset.content_hash = Some(hash);
    info!(
        "Parsed {} rows and {} columns for table {}",
        dataset.records.len(),
        dataset.columns.len(),
        table
    );

    let bad_columns = column_problems(&dataset.columns);
    if !bad_columns.is_empty() {
        return Err(UploadError::validation_with("Invalid column names", bad_columns));
    }
    let findings = suspicious_cells(&dataset);
    if !findings.is_empty() {
        if settings.halt_on_suspicious_content {
            return Err(UploadError::validation_with(
                "VALIDATION FAILED - Bad symbols detected",
                findings,
            ));
        }
        warn!(
            "Continuing upload to {} despite {} suspicious cell(s)",
            table,
            findings.len()
        );
    }

    let identity = match (&filename, request.data_source, dataset.content_hash.clone()) {
        (Some(filename), Some(data_source), Some(content_hash)) => Some(UploadIdentity {
            content_hash,
            filename: filename.clone(),
            data_source,
        }),
        _ => None,
    };

    let duplicate = match &identity {
        Some(id) => {
            match find_duplicate(
                store,
                settings.duplicate_scope,
                &id.content_hash,
                &id.filename,
                id.data_source,
            )
            .await
            {
                Ok(found) => found,
                Err(e) => {
                    warn!("Duplicate check failed, continuing: {}", e);
                    None
                }
            }
        }
        None => None,
    };
    if let Some(found) = &duplicate {
        warn!(
            "'{}' matches upload {} from {} ({:?} match)",
            dataset.source_filename, found.record.id, found.record.upload_date, found.kind
        );
    }

    let types = infer_column_types(&dataset);
    ensure_target_table(store, &settings.table_policy, &table, &types).await?;

    let report = insert_batches(store, &table, &dataset, &types).await;
    let batches = report.batches_attempted;

    if let Some(id) = &identity {
        record_upload(store, id, &table, report.inserted_rows).await;
    }

    let mut outcome = UploadOutcome::new(
        dataset.records.len(),
        report.inserted_rows,
        report.errors,
        dataset.columns,
        table,
        types,
    );
    outcome.duplicate = duplicate;
    info!(
        "Upload to {} finished: {} of {} rows inserted in {} batch(es)",
        outcome.table_name, outcome.inserted_rows, outcome.total_rows, batches
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicateScope;
    use crate::ingest::parse::ParseError;
    use crate::ingest::testing::{csv_with_rows, RecordingStore};
    use crate::store::HashLookup;
    use common::model::column::ColumnType;
    use common::model::outcome::DuplicateKind;

    fn auto_create() -> IngestSettings {
        IngestSettings {
            table_policy: TablePolicy::AutoCreate,
            ..IngestSettings::default()
        }
    }

    fn request(csv: &str, table: &str) -> UploadRequest {
        UploadRequest {
            file: Some(csv.as_bytes().to_vec()),
            table_name: Some(table.into()),
            file_name: Some("orders.csv".into()),
            data_source: Some(DataSourceTag::Shopee),
            ..UploadRequest::default()
        }
    }

    #[actix_web::test]
    async fn full_upload_inserts_and_records_history() {
        let store = RecordingStore::new();
        let outcome = run_upload(&store, &auto_create(), request(&csv_with_rows(120), "orders"))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.total_rows, 120);
        assert_eq!(outcome.inserted_rows, 120);
        assert_eq!(outcome.columns, vec!["order_id", "sku", "qty"]);
        assert_eq!(outcome.column_types["qty"], ColumnType::Integer);
        assert_eq!(outcome.duplicate, None);
        assert_eq!(store.row_count("orders").await, 120);

        let hash = content_hash(csv_with_rows(120).as_bytes());
        let saved = store
            .find_by_hash(&hash, HashLookup::Source(DataSourceTag::Shopee))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.rows_inserted, 120);
    }

    #[actix_web::test]
    async fn failing_second_batch_is_a_partial_success() {
        let store = RecordingStore::new();
        store
            .inner()
            .execute_batch(
                "CREATE TABLE orders (id INTEGER PRIMARY KEY, order_id INTEGER, sku TEXT, qty INTEGER NOT NULL)",
            )
            .await
            .unwrap();

        // Rows 101-200 have no quantity and violate NOT NULL.
        let mut csv = String::from("order_id,sku,qty\n");
        for i in 1..=250 {
            let qty = if (101..=200).contains(&i) { String::new() } else { "1".to_string() };
            csv.push_str(&format!("{},SKU{},{}\n", i, i, qty));
        }

        let outcome = run_upload(&store, &auto_create(), request(&csv, "orders"))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.partial_success);
        assert_eq!(outcome.inserted_rows, 100);
        assert_eq!(outcome.failed_rows, 150);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("Batch 2:"), "{}", outcome.errors[0]);
        assert_eq!(store.batch_sizes(), vec![100, 100]);
        assert_eq!(store.row_count("orders").await, 100);
    }

    #[actix_web::test]
    async fn same_bytes_twice_is_flagged_as_content_duplicate() {
        let store = RecordingStore::new();
        let csv = csv_with_rows(3);
        let first = run_upload(&store, &auto_create(), request(&csv, "orders")).await.unwrap();
        assert_eq!(first.duplicate, None);
        let recorded = store
            .find_by_hash(&content_hash(csv.as_bytes()), HashLookup::Any)
            .await
            .unwrap()
            .unwrap();

        let second = run_upload(&store, &auto_create(), request(&csv, "orders")).await.unwrap();
        let duplicate = second.duplicate.expect("second upload is a duplicate");
        assert_eq!(duplicate.kind, DuplicateKind::Content);
        assert_eq!(duplicate.record.upload_date, recorded.upload_date);
        // Advisory only: the rows went in again.
        assert!(second.success);
        assert_eq!(store.row_count("orders").await, 6);
    }

    #[actix_web::test]
    async fn empty_file_is_rejected_before_touching_the_store() {
        let store = RecordingStore::new();
        for csv in ["", "order_id,sku\n"] {
            let err = run_upload(&store, &auto_create(), request(csv, "orders"))
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::Parse(ParseError::Empty)), "{err:?}");
        }
        assert!(store.calls().is_empty());
    }

    #[actix_web::test]
    async fn missing_file_or_table_is_a_validation_error() {
        let store = RecordingStore::new();
        let no_file = UploadRequest {
            file: None,
            ..request("a\n1\n", "orders")
        };
        assert!(matches!(
            run_upload(&store, &auto_create(), no_file).await,
            Err(UploadError::Validation { .. })
        ));

        let blank_table = request("a\n1\n", "  ");
        assert!(matches!(
            run_upload(&store, &auto_create(), blank_table).await,
            Err(UploadError::Validation { .. })
        ));
        assert!(store.calls().is_empty());
    }

    #[actix_web::test]
    async fn rejects_bad_names_and_oversized_files() {
        let store = RecordingStore::new();
        let mut bad_ext = request("a\n1\n", "orders");
        bad_ext.file_name = Some("orders.xlsx".into());
        assert!(run_upload(&store, &auto_create(), bad_ext).await.is_err());

        let bad_table = request("a\n1\n", "orders; drop");
        assert!(run_upload(&store, &auto_create(), bad_table).await.is_err());

        let tiny = IngestSettings {
            max_upload_bytes: 4,
            ..auto_create()
        };
        assert!(run_upload(&store, &tiny, request("a\n1\n2\n", "orders")).await.is_err());
        assert!(store.calls().is_empty());
    }

    #[test]
    fn size_limit_message_names_a_readable_limit() {
        let message = |max| match too_large(max) {
            UploadError::Validation { message, .. } => message,
            other => panic!("unexpected {other:?}"),
        };
        assert!(message(10 * 1024 * 1024).ends_with("is 10MB"));
        assert!(message(1536 * 1024).ends_with("is 1.5MB"));
        assert!(message(4).ends_with("is 4 bytes"));
    }

    #[actix_web::test]
    async fn suspicious_content_halts_unless_configured_otherwise() {
        let store = RecordingStore::new();
        let csv = "sku,note\nA,ok /* hi */\n";
        let err = run_upload(&store, &auto_create(), request(csv, "orders"))
            .await
            .unwrap_err();
        match err {
            UploadError::Validation { details, .. } => assert_eq!(details.len(), 2),
            other => panic!("unexpected {other:?}"),
        }

        let lenient = IngestSettings {
            halt_on_suspicious_content: false,
            ..auto_create()
        };
        let outcome = run_upload(&store, &lenient, request(csv, "orders")).await.unwrap();
        assert!(outcome.success);
    }

    #[actix_web::test]
    async fn allow_list_rejects_unknown_and_missing_tables() {
        let store = RecordingStore::new();
        let settings = IngestSettings::default();

        let err = run_upload(&store, &settings, request("a\n1\n", "orders"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not an allowed upload target"));

        let err = run_upload(&store, &settings, request("a\n1\n", "temp_shopee_data"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!store.calls().contains(&"create_table"));
    }

    #[actix_web::test]
    async fn total_failure_cleans_stale_history() {
        let store = RecordingStore::failing_on_batch(2);
        let csv = csv_with_rows(5);
        let first = run_upload(&store, &auto_create(), request(&csv, "orders")).await.unwrap();
        assert!(first.success);

        // The second attempt of the same file fails on its only batch.
        let second = run_upload(&store, &auto_create(), request(&csv, "orders")).await.unwrap();
        assert!(!second.success && !second.partial_success);
        assert_eq!(second.inserted_rows, 0);
        assert!(store.calls().contains(&"delete_history"));
        assert_eq!(
            store.inner().query_i64("SELECT COUNT(*) FROM upload_history").await,
            Ok(0)
        );
    }

    #[actix_web::test]
    async fn without_source_no_history_is_touched() {
        let store = RecordingStore::new();
        let anonymous = UploadRequest {
            data_source: None,
            ..request(&csv_with_rows(2), "orders")
        };
        let outcome = run_upload(&store, &auto_create(), anonymous).await.unwrap();
        assert!(outcome.success);
        let calls = store.calls();
        assert!(!calls.contains(&"insert_history"));
        assert!(!calls.contains(&"find_by_hash"));
    }

    #[actix_web::test]
    async fn client_hash_identifies_the_upload() {
        let store = RecordingStore::new();
        let mut req = request(&csv_with_rows(2), "orders");
        req.content_hash = Some("ABCDEF".into());
        run_upload(&store, &auto_create(), req).await.unwrap();

        let saved = store.find_by_hash("abcdef", HashLookup::Any).await.unwrap();
        assert_eq!(saved.map(|r| r.rows_inserted), Some(2));
    }

    #[test]
    fn duplicate_scope_defaults_to_same_source() {
        assert_eq!(IngestSettings::default().duplicate_scope, DuplicateScope::SameSource);
    }
}
