//! CSV text to `ParsedDataset`.

use csv::ReaderBuilder;
use indexmap::IndexMap;
use thiserror::Error;

/// One CSV row, column name to raw cell text.
pub type Record = IndexMap<String, String>;

/// A parsed upload, alive for the duration of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDataset {
    pub records: Vec<Record>,
    /// Unique column names in header order.
    pub columns: Vec<String>,
    pub source_filename: String,
    pub content_hash: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("file is not valid UTF-8 text")]
    Encoding,
    #[error("CSV parsing failed: {0}")]
    Malformed(String),
    #[error("No data found in CSV")]
    Empty,
}

/// Decodes upload bytes as UTF-8, dropping a leading byte order mark.
pub fn decode_text(bytes: &[u8]) -> Result<&str, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding)?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Parses CSV text with a header row.
///
/// Headers go through `normalize`; headers that normalize to the same name share
/// one column and the rightmost value wins. Blank lines are skipped. A row whose
/// field count differs from the header is a parse error, as is a file without
/// any data rows.
pub fn parse_dataset<F>(
    text: &str,
    source_filename: &str,
    normalize: F,
) -> Result<ParsedDataset, ParseError>
where
    F: Fn(&str) -> String,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Malformed(e.to_string()))?
        .iter()
        .map(|h| normalize(h))
        .collect();

    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    for header in &headers {
        if !columns.contains(header) {
            columns.push(header.clone());
        }
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| ParseError::Malformed(e.to_string()))?;
        if row.len() == 1 && row.get(0).is_some_and(str::is_empty) {
            continue;
        }
        if row.len() != headers.len() {
            let line = row
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 2);
            return Err(ParseError::Malformed(format!(
                "line {}: expected {} fields, found {}",
                line,
                headers.len(),
                row.len()
            )));
        }

        let mut record = Record::with_capacity(columns.len());
        for (header, value) in headers.iter().zip(row.iter()) {
            record.insert(header.clone(), value.to_string());
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(ParsedDataset {
        records,
        columns,
        source_filename: source_filename.to_string(),
        content_hash: None,
    })
}
