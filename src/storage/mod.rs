//! Flat-file persistence for SERP batches.
//!
//! Every fetch is written verbatim to its own CSV file whose name encodes
//! the fetch time. Files are read back by header name, so extra columns
//! (including a leftover index column) are tolerated.

pub mod reader;
pub mod writer;

pub use reader::{read_batch_file, write_united};
pub use writer::{parse_batch_timestamp, BatchStore};

use crate::models::{SerpRow, QUERY_TIME_FORMAT};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fixed suffix of every batch file name.
pub const BATCH_SUFFIX: &str = "_scheduled_serp.csv";

/// Timestamp layout inside batch file names (day, month, year, hour, minute, second).
pub const FILE_TIMESTAMP_FORMAT: &str = "%d%m%Y%H_%M_%S";

/// Columns a batch file must carry to be aggregated.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "searchTerms",
    "rank",
    "title",
    "displayLink",
    "link",
    "queryTime",
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} is missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path}:{line}: unparsable queryTime `{value}`")]
    Timestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// On-disk shape of one batch row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SerpRecord {
    pub search_terms: String,
    pub rank: u32,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    pub display_link: String,
    pub link: String,
    #[serde(default)]
    pub formatted_url: Option<String>,
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub gl: Option<String>,
    pub query_time: String,
}

impl From<&SerpRow> for SerpRecord {
    fn from(row: &SerpRow) -> Self {
        Self {
            search_terms: row.search_terms.clone(),
            rank: row.rank,
            title: row.title.clone(),
            snippet: row.snippet.clone(),
            display_link: row.display_link.clone(),
            link: row.link.clone(),
            formatted_url: row.formatted_url.clone(),
            total_results: row.total_results,
            gl: row.gl.clone(),
            query_time: row.query_time.format(QUERY_TIME_FORMAT).to_string(),
        }
    }
}

impl SerpRecord {
    /// Converts to a row, or returns the raw timestamp if it cannot be parsed.
    pub fn into_row(self) -> Result<SerpRow, String> {
        let query_time = match parse_query_time(&self.query_time) {
            Some(t) => t,
            None => return Err(self.query_time),
        };
        Ok(SerpRow {
            search_terms: self.search_terms,
            rank: self.rank,
            title: self.title,
            snippet: self.snippet,
            display_link: self.display_link,
            link: self.link,
            formatted_url: self.formatted_url,
            total_results: self.total_results,
            gl: self.gl,
            query_time,
        })
    }
}

/// Parse a `queryTime` cell.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fraction]+HH:MM` (what batch files contain),
/// RFC 3339, and an offset-less `YYYY-MM-DD HH:MM:SS[.fraction]` taken as UTC.
pub fn parse_query_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(t) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(t);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t);
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_query_time_formats() {
        let t = parse_query_time("2020-12-27 15:09:06.123456+00:00").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2020, 12, 27));
        assert_eq!((t.hour(), t.minute(), t.second()), (15, 9, 6));

        assert!(parse_query_time("2020-12-27 15:09:06+00:00").is_some());
        assert!(parse_query_time("2020-12-27T15:09:06Z").is_some());
        assert!(parse_query_time("2020-12-27 15:09:06").is_some());
        assert!(parse_query_time("27/12/2020").is_none());
        assert!(parse_query_time("").is_none());
    }

    #[test]
    fn test_parse_keeps_offset_for_day() {
        let t = parse_query_time("2021-01-05 23:30:00+03:00").unwrap();
        assert_eq!(t.date_naive().to_string(), "2021-01-05");
    }

    #[test]
    fn test_record_round_trips_time_format() {
        let t = parse_query_time("2021-01-05 08:30:00.5+00:00").unwrap();
        let row = SerpRow {
            search_terms: "q".into(),
            rank: 1,
            title: "t".into(),
            snippet: String::new(),
            display_link: "example.com".into(),
            link: "https://example.com".into(),
            formatted_url: None,
            total_results: None,
            gl: None,
            query_time: t,
        };
        let record = SerpRecord::from(&row);
        assert_eq!(record.query_time, "2021-01-05 08:30:00.500000+00:00");
        assert_eq!(record.into_row().unwrap(), row);
    }
}
