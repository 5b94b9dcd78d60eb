//! Rows of the `upload_history` table.
//!
//! A record is written once for every upload that inserted at least one row and is
//! only ever deleted afterwards, never updated. The duplicate check reads these
//! records to warn users about re-uploads of the same file.

use crate::model::datasource::DataSourceTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted upload history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: i64,
    /// SHA-256 of the uploaded file, lowercase hex.
    pub file_hash: String,
    pub original_filename: String,
    pub data_source: DataSourceTag,
    pub table_name: String,
    pub rows_inserted: i64,
    #[serde(with = "upload_date")]
    pub upload_date: DateTime<Utc>,
}

/// A history entry that has not been assigned an id by the store yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUploadRecord {
    pub file_hash: String,
    pub original_filename: String,
    pub data_source: DataSourceTag,
    pub table_name: String,
    pub rows_inserted: i64,
    #[serde(with = "upload_date")]
    pub upload_date: DateTime<Utc>,
}

impl NewUploadRecord {
    pub fn into_record(self, id: i64) -> UploadRecord {
        UploadRecord {
            id,
            file_hash: self.file_hash,
            original_filename: self.original_filename,
            data_source: self.data_source,
            table_name: self.table_name,
            rows_inserted: self.rows_inserted,
            upload_date: self.upload_date,
        }
    }
}

/// Timestamps are written as RFC 3339. Postgres `timestamp` columns come back
/// without an offset, those are read as UTC.
pub mod upload_date {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
            return Ok(value.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("invalid upload_date '{}'", raw))
    }
}
