//! Batch file naming and writing.

use super::{SerpRecord, StorageError, BATCH_SUFFIX, FILE_TIMESTAMP_FORMAT};
use crate::models::SerpBatch;
use chrono::NaiveDateTime;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Upper bound on `-N` disambiguators tried for one timestamp.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Build the file name for a batch fetched at `at`.
///
/// `serp` + 27 Dec 2020 15:09:06 gives `serp2712202015_09_06_scheduled_serp.csv`.
pub fn batch_file_name(prefix: &str, at: &NaiveDateTime) -> String {
    format!("{}{}{}", prefix, at.format(FILE_TIMESTAMP_FORMAT), BATCH_SUFFIX)
}

/// Recover the fetch timestamp from a batch file name written with `prefix`.
///
/// A `-N` collision counter after the timestamp is ignored.
pub fn parse_batch_timestamp(file_name: &str, prefix: &str) -> Option<NaiveDateTime> {
    let stamp = file_name
        .strip_prefix(prefix)?
        .strip_suffix(BATCH_SUFFIX)?;
    let stamp = match stamp.rsplit_once('-') {
        Some((head, counter)) if counter.chars().all(|c| c.is_ascii_digit()) => head,
        _ => stamp,
    };
    NaiveDateTime::parse_from_str(stamp, FILE_TIMESTAMP_FORMAT).ok()
}

/// Where batches are written.
#[derive(Debug, Clone)]
pub struct BatchStore {
    dir: PathBuf,
    prefix: String,
}

impl BatchStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Glob pattern matching every batch this store writes.
    pub fn pattern(&self) -> String {
        self.dir
            .join(format!("{}*{}", self.prefix, BATCH_SUFFIX))
            .to_string_lossy()
            .to_string()
    }

    /// Write a batch to a new file and return its path.
    ///
    /// The file is created exclusively; if the timestamped name is taken,
    /// a `-2`, `-3`, ... counter is appended to the timestamp.
    pub fn write(&self, batch: &SerpBatch) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let (path, file) = self.create_unique(&batch.fetched_at.naive_local())?;
        let mut writer = csv::Writer::from_writer(file);

        for row in &batch.rows {
            writer
                .serialize(SerpRecord::from(row))
                .map_err(|e| StorageError::csv(&path, e))?;
        }
        if batch.rows.is_empty() {
            // serde only emits the header alongside the first record
            writer
                .write_record(header())
                .map_err(|e| StorageError::csv(&path, e))?;
        }
        writer.flush().map_err(|e| StorageError::io(&path, e))?;

        info!("Wrote {} rows to {}", batch.rows.len(), path.display());
        Ok(path)
    }

    fn create_unique(&self, at: &NaiveDateTime) -> Result<(PathBuf, File), StorageError> {
        let base = batch_file_name(&self.prefix, at);
        let stem = base.trim_end_matches(BATCH_SUFFIX).to_string();

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let name = if attempt == 1 {
                base.clone()
            } else {
                format!("{}-{}{}", stem, attempt, BATCH_SUFFIX)
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} already exists, trying next name", path.display());
                }
                Err(e) => return Err(StorageError::io(&path, e)),
            }
        }

        Err(StorageError::io(
            self.dir.join(base),
            std::io::Error::new(ErrorKind::AlreadyExists, "no free batch file name"),
        ))
    }
}

fn header() -> [&'static str; 10] {
    [
        "searchTerms",
        "rank",
        "title",
        "snippet",
        "displayLink",
        "link",
        "formattedUrl",
        "totalResults",
        "gl",
        "queryTime",
    ]
}
