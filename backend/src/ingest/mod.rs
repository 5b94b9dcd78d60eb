//! The CSV ingestion pipeline, from uploaded bytes to rows in a staging table.

pub mod batch;
pub mod coerce;
pub mod content;
pub mod duplicates;
pub mod history;
pub mod identifiers;
pub mod infer;
pub mod orchestrator;
pub mod parse;

#[cfg(test)]
mod testing;
