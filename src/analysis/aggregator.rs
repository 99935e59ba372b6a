//! Batch file aggregation.
//!
//! This module discovers batch files with a glob pattern and concatenates
//! them, in lexical path order, into one [`AggregatedTable`].

use crate::models::{AggregatedRow, AggregatedTable};
use crate::storage::{read_batch_file, StorageError};
use glob::glob;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("no files match `{0}`")]
    NoMatches(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// List files matching `pattern`, sorted lexically.
///
/// Unreadable directory entries are skipped with a warning.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>, AggregateError> {
    let entries = glob(pattern).map_err(|source| AggregateError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(exc) => {
                warn!("glob iteration error: {exc}");
                continue;
            }
        };
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Discover and concatenate every batch file matching `pattern`.
pub fn aggregate(pattern: &str) -> Result<AggregatedTable, AggregateError> {
    let files = discover(pattern)?;
    if files.is_empty() {
        return Err(AggregateError::NoMatches(pattern.to_string()));
    }
    let table = aggregate_files(&files)?;
    info!(
        "Aggregated {} rows from {} files matching {}",
        table.len(),
        table.files.len(),
        pattern
    );
    Ok(table)
}

/// Concatenate the given files in the given order.
///
/// The first unreadable file aborts the whole aggregation.
pub fn aggregate_files(files: &[PathBuf]) -> Result<AggregatedTable, AggregateError> {
    let mut table = AggregatedTable::default();

    for path in files {
        let rows = read_batch_file(path)?;
        debug!("{}: {} rows", path.display(), rows.len());
        table
            .rows
            .extend(rows.into_iter().map(|row| AggregatedRow::new(row, path.clone())));
        table.files.push(path.clone());
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::row;
    use crate::models::SerpBatch;
    use crate::storage::BatchStore;
    use chrono::{Local, TimeZone};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Write a pizza/bigmac batch observed at `time` with three rows each.
    fn write_batch(dir: &Path, file_stamp: (u32, u32), time: &str) -> PathBuf {
        let store = BatchStore::new(dir, "serp");
        let fetched_at = Local
            .with_ymd_and_hms(2021, file_stamp.0, file_stamp.1, 10, 0, 0)
            .earliest()
            .unwrap();
        let mut batch = SerpBatch::new(
            fetched_at,
            vec!["Calories in Pizza".into(), "Calories in BigMac".into()],
        );
        for (rank, domain) in ["a.com", "b.com", "c.com"].iter().enumerate() {
            batch
                .rows
                .push(row("Calories in Pizza", rank as u32 + 1, domain, time));
        }
        for (rank, domain) in ["a.com", "x.com", "y.com"].iter().enumerate() {
            batch
                .rows
                .push(row("Calories in BigMac", rank as u32 + 1, domain, time));
        }
        store.write(&batch).unwrap()
    }

    fn multiset(table: &AggregatedTable) -> Vec<String> {
        let mut keys: Vec<String> = table
            .rows
            .iter()
            .map(|r| {
                format!(
                    "{}|{}|{}|{}",
                    r.row.search_terms, r.row.rank, r.row.display_link, r.row.query_time
                )
            })
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_two_days_aggregate_to_twelve_rows() {
        let dir = TempDir::new().unwrap();
        write_batch(dir.path(), (1, 5), "2021-01-05 10:00:00");
        write_batch(dir.path(), (1, 6), "2021-01-06 10:00:00");
        let pattern = BatchStore::new(dir.path(), "serp").pattern();

        let table = aggregate(&pattern).unwrap();
        assert_eq!(table.len(), 12);
        assert_eq!(table.files.len(), 2);
        assert_eq!(table.distinct_days(), vec!["2021-01-05", "2021-01-06"]);
        for r in &table.rows {
            assert_eq!(r.query_day, r.row.query_time.date_naive());
        }
    }

    #[test]
    fn test_same_day_has_one_query_day() {
        let dir = TempDir::new().unwrap();
        write_batch(dir.path(), (1, 5), "2021-01-05 10:00:00");
        write_batch(dir.path(), (1, 6), "2021-01-05 18:30:00");
        let pattern = BatchStore::new(dir.path(), "serp").pattern();

        let table = aggregate(&pattern).unwrap();
        assert_eq!(table.len(), 12);
        assert_eq!(table.distinct_days(), vec!["2021-01-05"]);
    }

    #[test]
    fn test_pizza_filter_over_aggregated_files() {
        let dir = TempDir::new().unwrap();
        write_batch(dir.path(), (1, 5), "2021-01-05 10:00:00");
        write_batch(dir.path(), (1, 6), "2021-01-06 10:00:00");
        let pattern = BatchStore::new(dir.path(), "serp").pattern();

        let table = aggregate(&pattern).unwrap();
        let pizza = crate::analysis::select::filter_by_term(&table.rows, "pizza");
        assert_eq!(pizza.len(), 3 * table.files.len());
        assert!(pizza
            .iter()
            .all(|r| r.row.search_terms.to_lowercase().contains("pizza")));
    }

    #[test]
    fn test_aggregation_is_associative() {
        let dir = TempDir::new().unwrap();
        let a = write_batch(dir.path(), (1, 5), "2021-01-05 10:00:00");
        let b = write_batch(dir.path(), (1, 6), "2021-01-06 10:00:00");
        let c = write_batch(dir.path(), (1, 7), "2021-01-07 10:00:00");

        let all = aggregate_files(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let split = aggregate_files(&[a, b])
            .unwrap()
            .concat(aggregate_files(&[c]).unwrap());

        assert_eq!(all.len(), 18);
        assert_eq!(multiset(&all), multiset(&split));
    }

    #[test]
    fn test_discovery_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("serp_b_scheduled_serp.csv"), "").unwrap();
        fs::write(dir.path().join("serp_a_scheduled_serp.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("serp_dir_scheduled_serp.csv")).unwrap();

        let pattern = BatchStore::new(dir.path(), "serp").pattern();
        let files = discover(&pattern).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["serp_a_scheduled_serp.csv", "serp_b_scheduled_serp.csv"]
        );
    }

    #[test]
    fn test_no_matches_is_an_error() {
        let dir = TempDir::new().unwrap();
        let pattern = BatchStore::new(dir.path(), "serp").pattern();
        assert!(matches!(
            aggregate(&pattern),
            Err(AggregateError::NoMatches(_))
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            aggregate("serp[*_scheduled_serp.csv"),
            Err(AggregateError::Pattern { .. })
        ));
    }

    #[test]
    fn test_one_malformed_file_aborts() {
        let dir = TempDir::new().unwrap();
        write_batch(dir.path(), (1, 5), "2021-01-05 10:00:00");
        fs::write(
            dir.path().join("serp99999999_scheduled_serp.csv"),
            "searchTerms,rank\nq,1\n",
        )
        .unwrap();
        let pattern = BatchStore::new(dir.path(), "serp").pattern();

        match aggregate(&pattern) {
            Err(AggregateError::Storage(StorageError::MissingColumn { path, .. })) => {
                assert!(path.ends_with("serp99999999_scheduled_serp.csv"));
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }
}
