//! Column type inference over a sample of each column.
//!
//! Only the first `SAMPLE_SIZE` non-empty values of a column are looked at. A column
//! whose later values do not fit the sampled type keeps that type anyway; those
//! values are turned into NULL during coercion.

use crate::ingest::parse::ParsedDataset;
use common::model::column::{ColumnType, ColumnTypeMap};

pub const SAMPLE_SIZE: usize = 100;

const BOOLEAN_LITERALS: [&str; 6] = ["true", "false", "1", "0", "yes", "no"];

fn is_boolean_literal(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    BOOLEAN_LITERALS.contains(&lowered.as_str())
}

/// Whole-value numeric parse. Infinities and NaN do not count as numbers.
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Whole numbers outside the BIGINT range are left to DECIMAL.
fn is_storable_integer(n: f64) -> bool {
    n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64
}

/// Picks the narrowest type all sampled values satisfy.
pub fn classify<'a, I>(sample: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let sample: Vec<&str> = sample.into_iter().collect();
    if sample.is_empty() {
        return ColumnType::Text;
    }
    if sample.iter().all(|v| is_boolean_literal(v)) {
        return ColumnType::Boolean;
    }

    let numbers: Option<Vec<f64>> = sample.iter().map(|v| parse_number(v)).collect();
    match numbers {
        Some(numbers) if numbers.iter().all(|n| is_storable_integer(*n)) => ColumnType::Integer,
        Some(_) => ColumnType::Decimal,
        None => ColumnType::Text,
    }
}

/// Infers a type for every column of the dataset, in column order.
pub fn infer_column_types(dataset: &ParsedDataset) -> ColumnTypeMap {
    dataset
        .columns
        .iter()
        .map(|column| {
            let sample = dataset
                .records
                .iter()
                .filter_map(|record| record.get(column))
                .map(String::as_str)
                .filter(|value| !value.is_empty())
                .take(SAMPLE_SIZE);
            (column.clone(), classify(sample))
        })
        .collect()
}
