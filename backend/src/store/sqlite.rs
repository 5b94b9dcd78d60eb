//! SQLite adapter.
//!
//! One connection guarded by a mutex; every call runs on the blocking thread pool
//! through `tokio::task::spawn_blocking` so the actix workers never wait on disk I/O.

use crate::ingest::coerce::{CoercedRecord, SqlValue};
use crate::ingest::identifiers::{is_valid_table_name, quote};
use crate::store::{HashLookup, Store, StoreError, TableStatus, HISTORY_TABLE};
use async_trait::async_trait;
use common::model::column::ColumnTypeMap;
use common::model::datasource::DataSourceTag;
use common::model::history::{NewUploadRecord, UploadRecord};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const HISTORY_DDL: &str = "
    CREATE TABLE IF NOT EXISTS upload_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_hash TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        data_source TEXT NOT NULL,
        table_name TEXT NOT NULL,
        rows_inserted INTEGER NOT NULL DEFAULT 0,
        upload_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_upload_history_file_hash ON upload_history(file_hash);
    CREATE INDEX IF NOT EXISTS idx_upload_history_data_source ON upload_history(data_source);
    CREATE INDEX IF NOT EXISTS idx_upload_history_upload_date ON upload_history(upload_date);
";

const HISTORY_COLUMNS: &str =
    "id, file_hash, original_filename, data_source, table_name, rows_inserted, upload_date";

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, message) => {
                let message = message.clone().unwrap_or_else(|| e.to_string());
                match e.code {
                    ErrorCode::ConstraintViolation => StoreError::Constraint(message),
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        StoreError::Transport(message)
                    }
                    _ if message.contains("no such table") => {
                        StoreError::MissingTable(message.trim_start_matches("no such table: ").to_string())
                    }
                    _ => StoreError::Rejected {
                        code: Some(format!("{:?}", e.code)),
                        message,
                    },
                }
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => StoreError::Decode(err.to_string()),
            _ => StoreError::Unexpected(err.to_string()),
        }
    }
}

impl From<&SqlValue> for Value {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Boolean(b) => Value::Integer(i64::from(*b)),
            SqlValue::Integer(i) => Value::Integer(*i),
            SqlValue::Decimal(f) => Value::Real(*f),
            SqlValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

fn read_history_row(row: &Row<'_>) -> rusqlite::Result<UploadRecord> {
    let source: String = row.get(3)?;
    let data_source = source.parse::<DataSourceTag>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(UploadRecord {
        id: row.get(0)?,
        file_hash: row.get(1)?,
        original_filename: row.get(2)?,
        data_source,
        table_name: row.get(4)?,
        rows_inserted: row.get(5)?,
        upload_date: row.get(6)?,
    })
}

fn checked_table(table: &str) -> Result<&str, StoreError> {
    if is_valid_table_name(table) {
        Ok(table)
    } else {
        Err(StoreError::InvalidIdentifier(table.to_string()))
    }
}

pub(crate) fn create_table_sql(table: &str, columns: &ColumnTypeMap) -> String {
    let mut definitions = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    definitions.extend(
        columns
            .iter()
            .map(|(name, ty)| format!("{} {}", quote(name), ty.sql_name())),
    );
    definitions.push("created_at TEXT DEFAULT CURRENT_TIMESTAMP".to_string());
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(table),
        definitions.join(", ")
    )
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and makes sure `upload_history` exists.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        info!("Opening SQLite store at {}", path);
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(HISTORY_DDL)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unexpected("sqlite connection lock poisoned".into()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Unexpected(format!("join error: {}", e)))?
    }

    /// Executes raw SQL. Used to prepare tables with constraints of their own.
    #[cfg(test)]
    pub async fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        let sql = sql.to_string();
        self.run(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    /// Runs a single-value query, for inspecting state.
    #[cfg(test)]
    pub async fn query_i64(&self, sql: &str) -> Result<i64, StoreError> {
        let sql = sql.to_string();
        self.run(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
            .await
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn table_status(&self, table: &str) -> Result<TableStatus, StoreError> {
        let table = checked_table(table)?.to_string();
        self.run(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(if found.is_some() {
                TableStatus::Exists
            } else {
                TableStatus::Missing
            })
        })
        .await
    }

    async fn create_table(&self, table: &str, columns: &ColumnTypeMap) -> Result<(), StoreError> {
        let sql = create_table_sql(checked_table(table)?, columns);
        self.run(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    async fn insert_batch(&self, table: &str, rows: &[CoercedRecord]) -> Result<(), StoreError> {
        let table = checked_table(table)?.to_string();
        let Some(first) = rows.first() else {
            return Ok(());
        };
        let columns: Vec<String> = first.keys().cloned().collect();
        let values: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map(Value::from).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        self.run(move |conn| {
            let column_list = columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(&table),
                column_list,
                placeholders
            );

            // Dropping the transaction on error rolls the whole batch back.
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in &values {
                    stmt.execute(params_from_iter(row.iter()))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn setup_history(&self) -> Result<(), StoreError> {
        self.run(|conn| Ok(conn.execute_batch(HISTORY_DDL)?)).await
    }

    async fn find_by_hash(
        &self,
        file_hash: &str,
        lookup: HashLookup,
    ) -> Result<Option<UploadRecord>, StoreError> {
        let file_hash = file_hash.to_string();
        self.run(move |conn| {
            let found = match lookup {
                HashLookup::Source(source) => conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM {} WHERE file_hash = ?1 AND data_source = ?2 ORDER BY id LIMIT 1",
                            HISTORY_COLUMNS, HISTORY_TABLE
                        ),
                        params![file_hash, source.as_str()],
                        read_history_row,
                    )
                    .optional()?,
                HashLookup::Any => conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM {} WHERE file_hash = ?1 ORDER BY id LIMIT 1",
                            HISTORY_COLUMNS, HISTORY_TABLE
                        ),
                        params![file_hash],
                        read_history_row,
                    )
                    .optional()?,
            };
            Ok(found)
        })
        .await
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Option<UploadRecord>, StoreError> {
        let filename = filename.to_string();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE original_filename = ?1 ORDER BY id LIMIT 1",
                        HISTORY_COLUMNS, HISTORY_TABLE
                    ),
                    params![filename],
                    read_history_row,
                )
                .optional()?)
        })
        .await
    }

    async fn insert_history(&self, record: NewUploadRecord) -> Result<UploadRecord, StoreError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO upload_history \
                 (file_hash, original_filename, data_source, table_name, rows_inserted, upload_date) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.file_hash,
                    record.original_filename,
                    record.data_source.as_str(),
                    record.table_name,
                    record.rows_inserted,
                    record.upload_date,
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(record.into_record(id))
        })
        .await
    }

    async fn delete_history(
        &self,
        file_hash: &str,
        data_source: DataSourceTag,
        filename: &str,
    ) -> Result<usize, StoreError> {
        let file_hash = file_hash.to_string();
        let filename = filename.to_string();
        self.run(move |conn| {
            Ok(conn.execute(
                "DELETE FROM upload_history \
                 WHERE file_hash = ?1 AND data_source = ?2 AND original_filename = ?3",
                params![file_hash, data_source.as_str(), filename],
            )?)
        })
        .await
    }

    async fn delete_empty_history(&self) -> Result<usize, StoreError> {
        self.run(|conn| Ok(conn.execute("DELETE FROM upload_history WHERE rows_inserted = 0", [])?))
            .await
    }
}
