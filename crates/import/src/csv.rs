use std::io::Read;
use thiserror::Error;

use crate::statement::{RawRow, RawValue};

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("No data rows")]
    NoDataRows,
}

/// Reads a headed CSV statement into raw rows keyed by header name.
///
/// Cells are kept as text (blank cells become [`RawValue::Empty`]); amount and
/// date interpretation is left to the statement normalizer.
pub fn read_rows<R: Read>(data: R, delimiter: u8) -> Result<Vec<RawRow>, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    for (i, name) in headers.iter().enumerate() {
        if headers[..i].contains(name) {
            return Err(CsvError::DuplicateColumn(name.clone()));
        }
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), RawValue::from(record.get(i).unwrap_or_default())))
            .collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(CsvError::NoDataRows);
    }

    Ok(rows)
}
