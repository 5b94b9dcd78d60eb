//! SQL identifier handling.
//!
//! Values are always bound as parameters; table and column names cannot be, so they
//! are constrained here before any statement is built from them.

use regex::Regex;
use std::sync::LazyLock;

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("static regex"));
static NOT_IDENT_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("static regex"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("static regex"));

/// Turns a raw CSV header into a column name usable by the store.
///
/// Lower-cases, maps everything outside `[a-z0-9_]` to `_`, collapses runs of
/// `_` and trims them from both ends. May return an empty string.
pub fn normalize_header(header: &str) -> String {
    let lowered = header.to_lowercase();
    let replaced = NOT_IDENT_CHAR.replace_all(&lowered, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

/// Double-quotes an identifier, escaping embedded quotes.
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
