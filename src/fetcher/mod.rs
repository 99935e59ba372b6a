//! SERP fetching.
//!
//! The fetcher issues every query against a search provider, numbers the
//! results in provider order and hands the batch to a [`BatchStore`].

use crate::models::{AggregatedRow, SerpBatch, SerpRow};
use crate::search::{
    FetchError, SearchProvider, SearchRequest, MAX_PAGE_SIZE, MAX_RESULTS_PER_QUERY,
};
use crate::storage::BatchStore;
use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{debug, info};

/// Options controlling a fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Results wanted per query, clamped to 1-100.
    pub results_per_query: u32,
    /// Country restriction forwarded to the provider.
    pub gl: Option<String>,
    /// Show a progress bar for multi-query fetches.
    pub show_progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            results_per_query: MAX_PAGE_SIZE,
            gl: None,
            show_progress: false,
        }
    }
}

/// A batch together with the file it was written to.
#[derive(Debug, Clone)]
pub struct StoredBatch {
    pub batch: SerpBatch,
    pub path: PathBuf,
}

impl StoredBatch {
    /// Rows of one fetched search term, tagged with the batch file.
    ///
    /// Fails when `term` is not one of the batch's search terms.
    pub fn rows_for_term(&self, term: &str) -> Result<Vec<AggregatedRow>> {
        if !self.batch.rows.iter().any(|r| r.search_terms == term) {
            bail!("`{}` is not one of the fetched search terms", term);
        }
        Ok(self
            .batch
            .rows
            .iter()
            .filter(|r| r.search_terms == term)
            .map(|r| AggregatedRow::new(r.clone(), self.path.clone()))
            .collect())
    }
}

/// Fetches SERP batches from a provider.
pub struct Fetcher<P> {
    provider: P,
    options: FetchOptions,
}

impl<P: SearchProvider> Fetcher<P> {
    pub fn new(provider: P, options: FetchOptions) -> Self {
        Self { provider, options }
    }

    /// Fetch every query once and return the batch.
    ///
    /// Provider errors are returned as-is; nothing is retried.
    pub async fn fetch(&self, queries: &[String]) -> Result<SerpBatch, FetchError> {
        let queries: Vec<String> = queries
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if queries.is_empty() {
            return Err(FetchError::EmptyQueries);
        }

        let mut batch = SerpBatch::new(Local::now(), queries.clone());
        let progress = self.progress_bar(queries.len());

        for query in &queries {
            if let Some(ref pb) = progress {
                pb.set_message(query.clone());
            }
            let rows = self.fetch_query(query).await?;
            debug!("'{}' returned {} results", query, rows.len());
            batch.rows.extend(rows);
            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        info!(
            "Fetched {} rows for {} queries",
            batch.rows.len(),
            batch.queries.len()
        );
        Ok(batch)
    }

    /// Fetch and write the batch to `store`.
    pub async fn fetch_and_store(&self, queries: &[String], store: &BatchStore) -> Result<StoredBatch> {
        let batch = self.fetch(queries).await.context("SERP fetch failed")?;
        let path = store.write(&batch).context("Failed to write SERP batch")?;
        Ok(StoredBatch { batch, path })
    }

    /// Fetch and store a single interactive keyword.
    ///
    /// A blank keyword issues no request and yields `None`.
    pub async fn explore(&self, keyword: &str, store: &BatchStore) -> Result<Option<StoredBatch>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(None);
        }
        self.fetch_and_store(&[keyword.to_string()], store)
            .await
            .map(Some)
    }

    /// Page through one query. Ranks continue across pages.
    async fn fetch_query(&self, query: &str) -> Result<Vec<SerpRow>, FetchError> {
        // values from the config file skip CLI validation
        let wanted = self
            .options
            .results_per_query
            .clamp(1, MAX_RESULTS_PER_QUERY);
        let mut rows = Vec::new();
        let mut start = 1;

        while start <= wanted {
            let num = MAX_PAGE_SIZE.min(wanted - start + 1);
            let request = SearchRequest {
                query: query.to_string(),
                start,
                num,
                gl: self.options.gl.clone(),
            };
            let page = self.provider.search(&request).await?;
            let query_time = Utc::now().fixed_offset();
            let received = page.items.len() as u32;

            for (offset, item) in page.items.into_iter().enumerate() {
                rows.push(SerpRow {
                    search_terms: query.to_string(),
                    rank: start + offset as u32,
                    title: item.title,
                    snippet: item.snippet,
                    display_link: item.display_link,
                    link: item.link,
                    formatted_url: item.formatted_url,
                    total_results: page.total_results,
                    gl: self.options.gl.clone(),
                    query_time,
                });
            }

            if received < num {
                break;
            }
            start += num;
        }

        Ok(rows)
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.options.show_progress || len < 2 {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}
