//! Runtime configuration.
//!
//! Values come from the process environment, after `.env` (if any) has been
//! loaded with `dotenvy`. Everything is read once at startup into an immutable
//! `AppConfig` that is shared through the application state.

use common::model::datasource::DataSourceTag;
use std::env;
use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Where upload data and history are stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreSettings {
    Sqlite { path: String },
    Rest { base_url: String, api_key: String },
}

/// What happens when the target table of an upload does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub enum TablePolicy {
    /// Create it from the inferred column types.
    AutoCreate,
    /// Only these existing tables may be written to.
    AllowList(Vec<String>),
}

/// How far the content-hash half of the duplicate check looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateScope {
    SameSource,
    AllSources,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    pub secret: String,
    pub login_password: String,
    pub allowed_emails: Vec<String>,
    pub session_ttl_secs: i64,
    pub cookie_secure: bool,
}

/// Knobs of the upload pipeline itself.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub table_policy: TablePolicy,
    pub duplicate_scope: DuplicateScope,
    pub halt_on_suspicious_content: bool,
    pub max_upload_bytes: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            table_policy: TablePolicy::AllowList(default_allowed_tables()),
            duplicate_scope: DuplicateScope::SameSource,
            halt_on_suspicious_content: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreSettings,
    pub ingest: IngestSettings,
    pub auth: AuthSettings,
}

fn default_allowed_tables() -> Vec<String> {
    DataSourceTag::ALL.iter().map(|tag| tag.default_table()).collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_string(),
    })
}

impl AppConfig {
    /// Loads `.env` if present and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine, the variables may already be exported.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match get("PORT") {
            Some(raw) => parse_number("PORT", &raw)?,
            None => 8080,
        };

        let store = match get("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("sqlite") => StoreSettings::Sqlite {
                path: get("SQLITE_PATH").unwrap_or_else(|| "uploads.sqlite".to_string()),
            },
            Some("rest") => StoreSettings::Rest {
                base_url: require("SUPABASE_URL")?.trim().trim_end_matches('/').to_string(),
                api_key: require("SUPABASE_SERVICE_ROLE_KEY")?.trim().to_string(),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let table_policy = match get("TABLE_POLICY").as_deref().map(str::trim) {
            Some("auto_create") => TablePolicy::AutoCreate,
            None | Some("allow_list") => TablePolicy::AllowList(
                get("ALLOWED_TABLES")
                    .map(|raw| split_list(&raw))
                    .unwrap_or_else(default_allowed_tables),
            ),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "TABLE_POLICY",
                    value: other.to_string(),
                })
            }
        };

        let duplicate_scope = match get("DUPLICATE_SCOPE").as_deref().map(str::trim) {
            None | Some("same_source") => DuplicateScope::SameSource,
            Some("all_sources") => DuplicateScope::AllSources,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "DUPLICATE_SCOPE",
                    value: other.to_string(),
                })
            }
        };

        let halt_on_suspicious_content = match get("HALT_ON_SUSPICIOUS_CONTENT") {
            Some(raw) => parse_bool("HALT_ON_SUSPICIOUS_CONTENT", &raw)?,
            None => true,
        };
        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => parse_number("MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let allowed_emails = split_list(&require("ALLOWED_EMAILS")?);
        if allowed_emails.is_empty() {
            return Err(ConfigError::Missing("ALLOWED_EMAILS"));
        }
        let auth = AuthSettings {
            secret: require("JWT_SECRET")?,
            login_password: require("LOGIN_PASSWORD")?,
            allowed_emails,
            session_ttl_secs: match get("SESSION_TTL_SECS") {
                Some(raw) => parse_number("SESSION_TTL_SECS", &raw)?,
                None => DEFAULT_SESSION_TTL_SECS,
            },
            cookie_secure: match get("COOKIE_SECURE") {
                Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
                None => false,
            },
        };

        Ok(AppConfig {
            host,
            port,
            store,
            ingest: IngestSettings {
                table_policy,
                duplicate_scope,
                halt_on_suspicious_content,
                max_upload_bytes,
            },
            auth,
        })
    }
}
