//! Hosted Postgres behind a PostgREST-style HTTP API (e.g. Supabase).
//!
//! Rows go through `/rest/v1/<table>`; DDL goes through an `execute_sql` RPC function
//! that the database must expose, taking a single `sql` text argument.

use crate::ingest::coerce::CoercedRecord;
use crate::ingest::identifiers::{is_valid_table_name, quote};
use crate::store::{HashLookup, Store, StoreError, TableStatus, HISTORY_TABLE};
use async_trait::async_trait;
use common::model::column::{ColumnType, ColumnTypeMap};
use common::model::datasource::DataSourceTag;
use common::model::history::{NewUploadRecord, UploadRecord};
use log::{debug, error, info};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const HISTORY_DDL: &str = "
    CREATE TABLE IF NOT EXISTS upload_history (
        id SERIAL PRIMARY KEY,
        file_hash VARCHAR(64) NOT NULL,
        original_filename VARCHAR(255) NOT NULL,
        data_source VARCHAR(50) NOT NULL,
        table_name VARCHAR(100) NOT NULL,
        rows_inserted INTEGER NOT NULL DEFAULT 0,
        upload_date TIMESTAMP DEFAULT NOW(),
        created_at TIMESTAMP DEFAULT NOW()
    );
    CREATE INDEX IF NOT EXISTS idx_upload_history_file_hash ON upload_history(file_hash);
    CREATE INDEX IF NOT EXISTS idx_upload_history_data_source ON upload_history(data_source);
    CREATE INDEX IF NOT EXISTS idx_upload_history_upload_date ON upload_history(upload_date);
";

const HISTORY_SELECT: &str =
    "id,file_hash,original_filename,data_source,table_name,rows_inserted,upload_date";

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// Maps a non-success response to a `StoreError`.
///
/// `table` names the table the request targeted, if any, so "relation does not
/// exist" answers can be reported as `MissingTable`.
pub(crate) fn map_api_error(status: StatusCode, body: &str, table: Option<&str>) -> StoreError {
    let payload: ApiError = serde_json::from_str(body).unwrap_or_default();
    let mut message = payload
        .message
        .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body.trim()));
    if let Some(details) = payload.details.filter(|d| !d.is_empty()) {
        message = format!("{} ({})", message, details);
    }
    if let Some(hint) = payload.hint.filter(|h| !h.is_empty()) {
        debug!("Store hint: {}", hint);
    }

    match payload.code.as_deref() {
        Some("42P01") | Some("PGRST205") => {
            StoreError::MissingTable(table.map(str::to_string).unwrap_or(message))
        }
        Some(code) if code.starts_with("23") => StoreError::Constraint(message),
        None if status == StatusCode::NOT_FOUND && table.is_some() => {
            StoreError::MissingTable(table.map(str::to_string).unwrap_or(message))
        }
        code => StoreError::Rejected {
            code: code.map(str::to_string),
            message,
        },
    }
}

fn postgres_type(ty: ColumnType) -> &'static str {
    match ty {
        // Marketplace order ids routinely exceed 32 bits.
        ColumnType::Integer => "BIGINT",
        other => other.sql_name(),
    }
}

pub(crate) fn create_table_sql(table: &str, columns: &ColumnTypeMap) -> String {
    let mut definitions = vec!["id SERIAL PRIMARY KEY".to_string()];
    definitions.extend(
        columns
            .iter()
            .map(|(name, ty)| format!("{} {}", quote(name), postgres_type(*ty))),
    );
    definitions.push("created_at TIMESTAMP DEFAULT NOW()".to_string());
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(table),
        definitions.join(", ")
    )
}

#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StoreError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StoreError::Unexpected("store URL is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| StoreError::Unexpected(format!("invalid API key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| StoreError::Unexpected(format!("invalid API key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        info!("Using REST store at {}", base_url);
        Ok(RestStore { client, base_url })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    /// Sends the request and turns non-success answers into errors.
    async fn send(request: RequestBuilder, table: Option<&str>) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| {
            error!("Store request failed: {}", e);
            StoreError::from(e)
        })?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(map_api_error(status, &body, table))
    }

    async fn execute_sql(&self, sql: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.rpc_url("execute_sql"))
            .json(&json!({ "sql": sql }));
        Self::send(request, None).await.map(|_| ())
    }

    async fn first_history(
        &self,
        filters: Vec<(&str, String)>,
    ) -> Result<Option<UploadRecord>, StoreError> {
        let mut query = vec![
            ("select", HISTORY_SELECT.to_string()),
            ("order", "id.asc".to_string()),
            ("limit", "1".to_string()),
        ];
        query.extend(filters);
        let request = self.client.get(self.table_url(HISTORY_TABLE)).query(&query);
        let rows: Vec<UploadRecord> = Self::send(request, Some(HISTORY_TABLE))
            .await?
            .json()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_history_where(&self, filters: Vec<(&str, String)>) -> Result<usize, StoreError> {
        let mut query = vec![("select", "id".to_string())];
        query.extend(filters);
        let request = self
            .client
            .delete(self.table_url(HISTORY_TABLE))
            .header("Prefer", "return=representation")
            .query(&query);
        let rows: Vec<serde_json::Value> = Self::send(request, Some(HISTORY_TABLE))
            .await?
            .json()
            .await?;
        Ok(rows.len())
    }
}

fn checked_table(table: &str) -> Result<&str, StoreError> {
    if is_valid_table_name(table) {
        Ok(table)
    } else {
        Err(StoreError::InvalidIdentifier(table.to_string()))
    }
}

#[async_trait]
impl Store for RestStore {
    async fn table_status(&self, table: &str) -> Result<TableStatus, StoreError> {
        let table = checked_table(table)?;
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("limit", "0")]);
        match Self::send(request, Some(table)).await {
            Ok(_) => Ok(TableStatus::Exists),
            Err(StoreError::MissingTable(_)) => Ok(TableStatus::Missing),
            Err(e) => Err(e),
        }
    }

    async fn create_table(&self, table: &str, columns: &ColumnTypeMap) -> Result<(), StoreError> {
        let table = checked_table(table)?;
        match self.execute_sql(&create_table_sql(table, columns)).await {
            Err(StoreError::Rejected { message, .. }) if message.contains("already exists") => {
                debug!("Table {} already exists", table);
                Ok(())
            }
            other => other,
        }
    }

    async fn insert_batch(&self, table: &str, rows: &[CoercedRecord]) -> Result<(), StoreError> {
        let table = checked_table(table)?;
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(rows);
        Self::send(request, Some(table)).await.map(|_| ())
    }

    async fn setup_history(&self) -> Result<(), StoreError> {
        self.execute_sql(HISTORY_DDL).await
    }

    async fn find_by_hash(
        &self,
        file_hash: &str,
        lookup: HashLookup,
    ) -> Result<Option<UploadRecord>, StoreError> {
        let mut filters = vec![("file_hash", format!("eq.{}", file_hash))];
        if let HashLookup::Source(source) = lookup {
            filters.push(("data_source", format!("eq.{}", source)));
        }
        self.first_history(filters).await
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Option<UploadRecord>, StoreError> {
        self.first_history(vec![("original_filename", format!("eq.{}", filename))])
            .await
    }

    async fn insert_history(&self, record: NewUploadRecord) -> Result<UploadRecord, StoreError> {
        let request = self
            .client
            .post(self.table_url(HISTORY_TABLE))
            .header("Prefer", "return=representation")
            .query(&[("select", HISTORY_SELECT)])
            .json(&record);
        let rows: Vec<UploadRecord> = Self::send(request, Some(HISTORY_TABLE))
            .await?
            .json()
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".into()))
    }

    async fn delete_history(
        &self,
        file_hash: &str,
        data_source: DataSourceTag,
        filename: &str,
    ) -> Result<usize, StoreError> {
        self.delete_history_where(vec![
            ("file_hash", format!("eq.{}", file_hash)),
            ("data_source", format!("eq.{}", data_source)),
            ("original_filename", format!("eq.{}", filename)),
        ])
        .await
    }

    async fn delete_empty_history(&self) -> Result<usize, StoreError> {
        self.delete_history_where(vec![("rows_inserted", "eq.0".to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_relation_becomes_missing_table() {
        let body = r#"{"code":"42P01","message":"relation \"public.temp_x\" does not exist","details":null,"hint":null}"#;
        assert_eq!(
            map_api_error(StatusCode::NOT_FOUND, body, Some("temp_x")),
            StoreError::MissingTable("temp_x".into())
        );

        let cache_miss = r#"{"code":"PGRST205","message":"Could not find the table 'public.temp_x' in the schema cache"}"#;
        assert!(matches!(
            map_api_error(StatusCode::NOT_FOUND, cache_miss, Some("temp_x")),
            StoreError::MissingTable(_)
        ));
    }

    #[test]
    fn integrity_codes_are_constraint_violations() {
        let body = r#"{"code":"23502","message":"null value in column \"qty\" violates not-null constraint","details":"Failing row contains (1, null)."}"#;
        match map_api_error(StatusCode::BAD_REQUEST, body, Some("orders")) {
            StoreError::Constraint(message) => {
                assert!(message.contains("not-null"));
                assert!(message.contains("Failing row"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_failures_keep_code_and_message() {
        let body = r#"{"code":"42501","message":"permission denied for table orders"}"#;
        assert_eq!(
            map_api_error(StatusCode::FORBIDDEN, body, Some("orders")),
            StoreError::Rejected {
                code: Some("42501".into()),
                message: "permission denied for table orders".into(),
            }
        );

        match map_api_error(StatusCode::BAD_GATEWAY, "upstream down", None) {
            StoreError::Rejected { code: None, message } => {
                assert_eq!(message, "HTTP 502: upstream down")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ddl_uses_postgres_types() {
        let mut columns = ColumnTypeMap::new();
        columns.insert("order_id".into(), ColumnType::Integer);
        columns.insert("paid".into(), ColumnType::Boolean);
        assert_eq!(
            create_table_sql("temp_tiktok_data", &columns),
            "CREATE TABLE IF NOT EXISTS \"temp_tiktok_data\" (id SERIAL PRIMARY KEY, \
             \"order_id\" BIGINT, \"paid\" BOOLEAN, created_at TIMESTAMP DEFAULT NOW())"
        );
    }

    #[test]
    fn urls_are_built_under_rest_v1() {
        let store = RestStore::new("https://db.example.com/", "key").unwrap();
        assert_eq!(
            store.table_url("upload_history"),
            "https://db.example.com/rest/v1/upload_history"
        );
        assert_eq!(
            store.rpc_url("execute_sql"),
            "https://db.example.com/rest/v1/rpc/execute_sql"
        );
        assert!(RestStore::new("  ", "key").is_err());
    }
}
