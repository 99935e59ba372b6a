//! Data models for SERP recording.
//!
//! This module contains the core data structures used throughout
//! the application for representing ranked results, fetch batches,
//! the aggregated table and per-domain statistics.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Format of the `queryTime` column written to batch files.
pub const QUERY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

/// Format of the derived `queryDay` column.
pub const QUERY_DAY_FORMAT: &str = "%Y-%m-%d";

/// Format used when a timestamp is shown on a chart axis or slider.
pub const QUERY_TIME_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One observed ranking event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerpRow {
    /// Query text as sent to the provider.
    pub search_terms: String,
    /// Position of the result (1-indexed).
    pub rank: u32,
    /// Result title.
    pub title: String,
    /// Result snippet text.
    pub snippet: String,
    /// Display domain of the result.
    pub display_link: String,
    /// Result URL.
    pub link: String,
    /// Provider-formatted URL, when present.
    pub formatted_url: Option<String>,
    /// Provider's estimate of the total result count for the query.
    pub total_results: Option<u64>,
    /// Country restriction the query was issued with.
    pub gl: Option<String>,
    /// When the result page was observed.
    pub query_time: DateTime<FixedOffset>,
}

impl SerpRow {
    /// Calendar day of the observation, in the timestamp's own offset.
    pub fn query_day(&self) -> NaiveDate {
        self.query_time.date_naive()
    }
}

/// The result of one fetch call.
#[derive(Debug, Clone, Serialize)]
pub struct SerpBatch {
    /// Wall-clock time the batch was fetched.
    pub fetched_at: DateTime<Local>,
    /// Queries issued, in order.
    pub queries: Vec<String>,
    /// Ranked rows, in provider order per query.
    pub rows: Vec<SerpRow>,
}

impl SerpBatch {
    /// Creates an empty batch stamped with the given fetch time.
    pub fn new(fetched_at: DateTime<Local>, queries: Vec<String>) -> Self {
        Self {
            fetched_at,
            queries,
            rows: Vec::new(),
        }
    }

    /// Distinct query values in order of first appearance.
    pub fn distinct_terms(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|r| r.search_terms.as_str()))
    }
}

/// A SERP row after aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub row: SerpRow,
    /// Date portion of `query_time`.
    pub query_day: NaiveDate,
    /// File the row was read from.
    pub source: PathBuf,
}

impl AggregatedRow {
    pub fn new(row: SerpRow, source: PathBuf) -> Self {
        let query_day = row.query_day();
        Self {
            row,
            query_day,
            source,
        }
    }

    /// `queryDay` rendered as `YYYY-MM-DD`.
    pub fn query_day_label(&self) -> String {
        self.query_day.format(QUERY_DAY_FORMAT).to_string()
    }
}

/// All discovered batches concatenated into one table.
#[derive(Debug, Clone, Default)]
pub struct AggregatedTable {
    /// Files that contributed rows, in discovery order.
    pub files: Vec<PathBuf>,
    /// Rows in file order, then row order within each file.
    pub rows: Vec<AggregatedRow>,
}

impl AggregatedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends another table after this one.
    pub fn concat(mut self, other: AggregatedTable) -> Self {
        self.files.extend(other.files);
        self.rows.extend(other.rows);
        self
    }

    /// Distinct `queryDay` values in order of first appearance.
    pub fn distinct_days(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|r| r.query_day_label()))
    }

    /// Distinct search terms in order of first appearance.
    pub fn distinct_terms(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|r| r.row.search_terms.as_str()))
    }
}

fn distinct_in_order<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let value = value.as_ref();
        if seen.insert(value.to_string()) {
            out.push(value.to_string());
        }
    }
    out
}

/// A column of the aggregated table that charts can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Column {
    #[value(name = "searchTerms")]
    SearchTerms,
    #[value(name = "rank")]
    Rank,
    #[value(name = "title")]
    Title,
    #[value(name = "snippet")]
    Snippet,
    #[value(name = "displayLink")]
    DisplayLink,
    #[value(name = "link")]
    Link,
    #[value(name = "queryTime")]
    QueryTime,
    #[value(name = "queryDay")]
    QueryDay,
}

impl Column {
    /// Column header as written in batch files.
    pub fn name(&self) -> &'static str {
        match self {
            Column::SearchTerms => "searchTerms",
            Column::Rank => "rank",
            Column::Title => "title",
            Column::Snippet => "snippet",
            Column::DisplayLink => "displayLink",
            Column::Link => "link",
            Column::QueryTime => "queryTime",
            Column::QueryDay => "queryDay",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Rank)
    }

    /// Reads this column from a row.
    pub fn value(&self, row: &AggregatedRow) -> CellValue {
        match self {
            Column::SearchTerms => CellValue::Text(row.row.search_terms.clone()),
            Column::Rank => CellValue::Number(f64::from(row.row.rank)),
            Column::Title => CellValue::Text(row.row.title.clone()),
            Column::Snippet => CellValue::Text(row.row.snippet.clone()),
            Column::DisplayLink => CellValue::Text(row.row.display_link.clone()),
            Column::Link => CellValue::Text(row.row.link.clone()),
            Column::QueryTime => CellValue::Text(
                row.row
                    .query_time
                    .format(QUERY_TIME_LABEL_FORMAT)
                    .to_string(),
            ),
            Column::QueryDay => CellValue::Text(row.query_day_label()),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single table cell as seen by the chart builder.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    /// JSON representation; whole numbers are emitted as integers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                serde_json::Value::from(*n as i64)
            }
            CellValue::Number(n) => serde_json::Value::from(*n),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Per-domain ranking statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainStats {
    /// Display domain.
    pub domain: String,
    /// Number of result rows for the domain.
    pub count: usize,
    /// Mean rank across those rows.
    pub mean_rank: f64,
    /// Share of result pages the domain appeared on.
    pub coverage: f64,
}

/// Metadata about a statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Glob pattern the table was aggregated from.
    pub pattern: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of batch files aggregated.
    pub files: usize,
    /// Number of rows aggregated.
    pub rows: usize,
    /// Number of distinct result pages (query + observation time).
    pub pages: usize,
    /// Distinct observation days, in order of first appearance.
    pub days: Vec<String>,
}

/// Row count for one search term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSummary {
    pub search_terms: String,
    pub rows: usize,
    pub observations: usize,
}

/// The complete domain statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub metadata: ReportMetadata,
    /// Top domains, most frequent first.
    pub domains: Vec<DomainStats>,
    /// Search terms, in order of first appearance.
    pub terms: Vec<TermSummary>,
}
