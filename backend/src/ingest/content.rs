//! Upload fingerprinting and the suspicious-content filter.
//!
//! The filter is a coarse content check on top of parameterized inserts: it flags
//! cells that look like SQL comment or statement fragments so an operator can look
//! at the file before it lands in a staging table.

use crate::ingest::parse::ParsedDataset;
use sha2::{Digest, Sha256};

/// Number of leading records whose cells are scanned.
pub const SCAN_ROWS: usize = 100;

const SUSPICIOUS_PATTERNS: [&str; 6] = [";DROP", "--", "/*", "*/", "\\x00", "\\0"];

/// SHA-256 of the exact upload bytes, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Column names that can never be stored: empty or containing NUL.
pub fn column_problems(columns: &[String]) -> Vec<String> {
    let mut problems = Vec::new();
    for (index, column) in columns.iter().enumerate() {
        if column.is_empty() {
            problems.push(format!("Column {} has an empty name", index + 1));
        } else if column.contains('\0') {
            problems.push(format!("Column \"{}\" contains null bytes", column));
        }
    }
    problems
}

/// Cells of the first `SCAN_ROWS` records containing a suspicious pattern.
///
/// Matching is case-insensitive. Rows are reported 1-based.
pub fn suspicious_cells(dataset: &ParsedDataset) -> Vec<String> {
    let mut findings = Vec::new();
    for (index, record) in dataset.records.iter().take(SCAN_ROWS).enumerate() {
        for (column, value) in record {
            let upper = value.to_uppercase();
            for pattern in SUSPICIOUS_PATTERNS {
                if upper.contains(&pattern.to_uppercase()) {
                    findings.push(format!(
                        "Row {}, Column \"{}\": Contains dangerous pattern \"{}\"",
                        index + 1,
                        column,
                        pattern
                    ));
                }
            }
            if value.contains('\0') {
                findings.push(format!(
                    "Row {}, Column \"{}\": Contains null bytes",
                    index + 1,
                    column
                ));
            }
        }
    }
    findings
}
