//! Sheet rows: flat column -> string maps built from value ranges

use std::collections::{HashMap, HashSet};
use tracing::warn;

/// One data row of a sheet, keyed by header name
pub type SheetRow = HashMap<String, String>;

/// Range read for sheets -> notion and cleared before notion -> sheets writes
pub const FULL_RANGE: &str = "A:Z";

/// Top-left cell the header row is written to
pub const WRITE_ANCHOR: &str = "A1";

/// Turn a raw value range into rows, using the first row as headers.
///
/// Short rows are padded with empty strings; cells beyond the header width
/// are dropped. A repeated header keeps its first column only.
pub fn rows_from_values(values: Vec<Vec<String>>) -> Vec<SheetRow> {
    let mut iter = values.into_iter();
    let headers = match iter.next() {
        Some(headers) => headers,
        None => return Vec::new(),
    };

    let mut seen = HashSet::with_capacity(headers.len());
    let keep: Vec<bool> = headers.iter().map(|header| seen.insert(header.as_str())).collect();
    for (position, header) in headers.iter().enumerate().filter(|(i, _)| !keep[*i]) {
        warn!(header = %header, column = position + 1, "Duplicate sheet header, ignoring column");
    }

    iter.map(|row| {
        let mut cells = row.into_iter();
        headers
            .iter()
            .zip(&keep)
            .filter_map(|(header, kept)| {
                let cell = cells.next().unwrap_or_default();
                kept.then(|| (header.clone(), cell))
            })
            .collect()
    })
    .collect()
}

/// Header row followed by one line per row, in `columns` order
pub fn values_from_rows(columns: &[String], rows: &[SheetRow]) -> Vec<Vec<String>> {
    let mut values = Vec::with_capacity(rows.len() + 1);
    values.push(columns.to_vec());
    values.extend(rows.iter().map(|row| {
        columns
            .iter()
            .map(|col| row.get(col).cloned().unwrap_or_default())
            .collect()
    }));
    values
}
