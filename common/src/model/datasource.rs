use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The platform a CSV export comes from.
///
/// The tag travels with every upload and is stored in `upload_history.data_source`,
/// so its serialized form is the lowercase name (`"tiktok"`, `"shopee"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceTag {
    Tiktok,
    Shopee,
    Aipost,
    Goaffpro,
}

impl DataSourceTag {
    pub const ALL: [DataSourceTag; 4] = [
        DataSourceTag::Tiktok,
        DataSourceTag::Shopee,
        DataSourceTag::Aipost,
        DataSourceTag::Goaffpro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceTag::Tiktok => "tiktok",
            DataSourceTag::Shopee => "shopee",
            DataSourceTag::Aipost => "aipost",
            DataSourceTag::Goaffpro => "goaffpro",
        }
    }

    /// Staging table that exports of this source are loaded into by default.
    pub fn default_table(&self) -> String {
        format!("temp_{}_data", self.as_str())
    }
}

impl fmt::Display for DataSourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDataSource(pub String);

impl fmt::Display for UnknownDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown data source '{}'", self.0)
    }
}

impl std::error::Error for UnknownDataSource {}

impl FromStr for DataSourceTag {
    type Err = UnknownDataSource;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim().to_ascii_lowercase();
        DataSourceTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == needle)
            .ok_or_else(|| UnknownDataSource(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_case_insensitively() {
        assert_eq!("Shopee".parse::<DataSourceTag>(), Ok(DataSourceTag::Shopee));
        assert_eq!(" goaffpro ".parse::<DataSourceTag>(), Ok(DataSourceTag::Goaffpro));
        assert!("lazada".parse::<DataSourceTag>().is_err());
    }

    #[test]
    fn default_tables_follow_staging_convention() {
        assert_eq!(DataSourceTag::Tiktok.default_table(), "temp_tiktok_data");
        assert_eq!(DataSourceTag::Aipost.default_table(), "temp_aipost_data");
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&DataSourceTag::Goaffpro).unwrap();
        assert_eq!(json, "\"goaffpro\"");
    }
}
