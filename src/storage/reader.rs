//! Reading batch files and exporting aggregated tables.

use super::{SerpRecord, StorageError, REQUIRED_COLUMNS};
use crate::models::{AggregatedRow, SerpRow};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Headers left behind by tools that write the row index as a column.
const INDEX_HEADERS: [&str; 2] = ["", "Unnamed: 0"];

/// Read one batch file into rows.
///
/// Columns are matched by header name. Index columns and any other unknown
/// columns are dropped; a missing required column or an unparsable
/// `queryTime` fails the whole file.
pub fn read_batch_file(path: &Path) -> Result<Vec<SerpRow>, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| StorageError::csv(path, e))?
        .clone();

    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(StorageError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }
    if headers.iter().any(|h| INDEX_HEADERS.contains(&h)) {
        debug!("Dropping index column from {}", path.display());
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| StorageError::csv(path, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parsed: SerpRecord = record
            .deserialize(Some(&headers))
            .map_err(|e| StorageError::csv(path, e))?;
        let row = parsed
            .into_row()
            .map_err(|value| StorageError::Timestamp {
                path: path.to_path_buf(),
                line,
                value,
            })?;
        rows.push(row);
    }

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnitedRecord<'a> {
    search_terms: &'a str,
    rank: u32,
    title: &'a str,
    snippet: &'a str,
    display_link: &'a str,
    link: &'a str,
    formatted_url: Option<&'a str>,
    total_results: Option<u64>,
    gl: Option<&'a str>,
    query_time: String,
    query_day: String,
}

/// Write an aggregated table to a single CSV including `queryDay`.
///
/// The output keeps the batch schema, so it can itself be aggregated again.
pub fn write_united(path: &Path, rows: &[AggregatedRow]) -> Result<(), StorageError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| StorageError::csv(path, e))?;

    for row in rows {
        let record = SerpRecord::from(&row.row);
        writer
            .serialize(UnitedRecord {
                search_terms: &record.search_terms,
                rank: record.rank,
                title: &record.title,
                snippet: &record.snippet,
                display_link: &record.display_link,
                link: &record.link,
                formatted_url: record.formatted_url.as_deref(),
                total_results: record.total_results,
                gl: record.gl.as_deref(),
                query_time: record.query_time.clone(),
                query_day: row.query_day_label(),
            })
            .map_err(|e| StorageError::csv(path, e))?;
    }

    writer.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}
