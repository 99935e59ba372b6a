//! Search API access.
//!
//! This module defines the provider seam used by the fetcher and the
//! Google Programmable Search client that implements it.

pub mod client;

pub use client::{ClientConfig, GoogleSearchClient};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Most results the provider returns for one request.
pub const MAX_PAGE_SIZE: u32 = 10;

/// Most results the provider serves for one query across all pages.
pub const MAX_RESULTS_PER_QUERY: u32 = 100;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("at least one non-empty query is required")]
    EmptyQueries,
    #[error("missing credentials: {0} is not configured")]
    MissingCredentials(&'static str),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("cannot connect to search API at {0}")]
    Connect(String),
    #[error("failed to send request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("search API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode search API response: {0}")]
    Decode(String),
}

/// One page request against the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    /// 1-based index of the first result.
    pub start: u32,
    /// Results wanted on this page (1-10).
    pub num: u32,
    /// Country restriction.
    pub gl: Option<String>,
}

/// One result item as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub display_link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub formatted_url: Option<String>,
}

/// One page of provider results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub items: Vec<SearchItem>,
    pub total_results: Option<u64>,
}

/// Anything that can answer a search page request.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, FetchError>;
}
