use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The storage type inferred for a CSV column.
///
/// The backend samples each column of an upload and picks the narrowest type
/// every sampled value fits, in the order `Boolean`, `Integer`, `Decimal`,
/// falling back to `Text`. The same name is used as the SQL column type when
/// a target table has to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Boolean,
    Integer,
    Decimal,
    Text,
}

impl ColumnType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "INTEGER",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// Column name to inferred type, in header order.
pub type ColumnTypeMap = IndexMap<String, ColumnType>;
