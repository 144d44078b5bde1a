//! Tabular input: CSV with a header row, or a JSON array of objects.

use crate::data::Table;
use crate::error::{PlotError, Result};
use std::io::Read;
use tracing::debug;

/// Read CSV with a header row and infer column types.
pub fn read_csv<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PlotError::Data("CSV input has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }

    debug!(columns = headers.len(), rows = rows.len(), "read CSV");
    Table::from_rows(headers, rows)
}

/// Read a JSON array of objects; keys of the first object become the columns.
pub fn read_json<R: Read>(reader: R) -> Result<Table> {
    let value: serde_json::Value = serde_json::from_reader(reader)?;
    let table = Table::from_json(&value)?;
    debug!(columns = table.columns().len(), rows = table.num_rows(), "read JSON");
    Ok(table)
}
