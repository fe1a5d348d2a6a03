//! Paper-discovery sources.
//!
//! Every provider sits behind [`SourceAdapter`] and returns normalized
//! [`PaperRecord`]s. Adapters own their pagination and recover from
//! per-page failures themselves; they only return an error when nothing at
//! all could be retrieved.

pub mod arxiv;
pub mod scholar;

use crate::error::{PaperflowError, Result};
use crate::models::PaperRecord;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Source name of the arXiv adapter
pub const ARXIV: &str = "arxiv";

/// Source name of the Google Scholar adapter
pub const SCHOLAR: &str = "scholar";

/// Order in which sources are visited when a batch is flattened
pub const SOURCE_PRIORITY: &[&str] = &[ARXIV, SCHOLAR];

/// Per-call search parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_results: usize,
    /// Results from this year onwards
    pub year_from: Option<i32>,
    /// Results up to this year
    pub year_to: Option<i32>,
}

impl SearchOptions {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            year_from: None,
            year_to: None,
        }
    }

    pub fn with_years(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_from = year_from;
        self.year_to = year_to;
        self
    }
}

/// Uniform retrieval contract over one external provider.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable name used as the key in a `RetrievalBatch`.
    fn name(&self) -> &str;

    /// Retrieve up to `options.max_results` records in provider order.
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<PaperRecord>>;
}

/// Run `adapter.search` on a Tokio worker task.
///
/// The returned handle resolves to the same result `search` would; a panic
/// inside the adapter surfaces as a `JoinError` instead of unwinding into
/// the caller.
pub fn spawn_search(
    adapter: Arc<dyn SourceAdapter>,
    query: String,
    options: SearchOptions,
) -> JoinHandle<Result<Vec<PaperRecord>>> {
    tokio::spawn(async move { adapter.search(&query, &options).await })
}

/// Matches a publication year between 1900 and 2099.
pub(crate) fn year_regex() -> Result<Regex> {
    Regex::new(r"\b(19|20)\d{2}\b").map_err(|e| PaperflowError::Parse(e.to_string()))
}

/// First year token in `text`.
pub(crate) fn extract_year(year_regex: &Regex, text: &str) -> Option<i32> {
    year_regex
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}
