//! Request-scoped records flowing through the pipeline.
//!
//! Nothing here is persisted locally; the only durable state lives in the
//! external memory store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Canonical paper record produced by every source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaperRecord {
    /// Trimmed title, the dedup key
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_or_summary: String,
    pub year: Option<i32>,
    /// "arXiv", "Google Scholar", ...
    pub venue_or_source: String,
    pub url: String,
    pub pdf_url: Option<String>,
    pub citation_count: u64,
    /// Only populated for arXiv-origin records
    pub categories: BTreeSet<String>,
    /// Name of the adapter that produced this record
    pub source_provider_name: String,
}

impl PaperRecord {
    /// Key used to decide whether two records are the same paper.
    ///
    /// Exact and case-sensitive after trimming.
    pub fn dedup_key(&self) -> &str {
        self.title.trim()
    }

    /// URL handed to the store: the PDF when the source exposes one.
    pub fn canonical_url(&self) -> &str {
        match self.pdf_url.as_deref() {
            Some(pdf) if !pdf.is_empty() => pdf,
            _ => &self.url,
        }
    }
}

/// Collapse internal whitespace runs (newlines in Atom titles etc.) to one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Per-source results of one parallel retrieval.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalBatch {
    /// Source name -> records in provider order. Failed sources map to an empty list.
    pub results: HashMap<String, Vec<PaperRecord>>,
    /// Source name -> failure description, for sources that failed.
    pub failures: HashMap<String, String>,
}

impl RetrievalBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_success(&mut self, source: &str, records: Vec<PaperRecord>) {
        self.results.insert(source.to_string(), records);
    }

    pub fn insert_failure(&mut self, source: &str, message: String) {
        self.results.insert(source.to_string(), Vec::new());
        self.failures.insert(source.to_string(), message);
    }

    pub fn get(&self, source: &str) -> Option<&[PaperRecord]> {
        self.results.get(source).map(Vec::as_slice)
    }

    pub fn is_failed(&self, source: &str) -> bool {
        self.failures.contains_key(source)
    }

    /// Total number of records across all sources.
    pub fn total(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// Flatten into one sequence with a reproducible source order.
    ///
    /// Sources listed in `priority` come first in that order; any others
    /// follow sorted by name. Provider order is kept within each source.
    pub fn flatten(&self, priority: &[&str]) -> Vec<&PaperRecord> {
        let mut names: Vec<&String> = self.results.keys().collect();
        names.sort_by(|a, b| {
            let rank = |n: &str| priority.iter().position(|p| *p == n).unwrap_or(priority.len());
            rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
        });

        names
            .into_iter()
            .filter_map(|name| self.results.get(name))
            .flat_map(|records| records.iter())
            .collect()
    }
}

/// Result of one ingestion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionOutcome {
    /// Records successfully added to the store, in visit order
    pub uploaded: Vec<PaperRecord>,
    /// Titles already present (or repeated within the batch)
    pub skipped: Vec<String>,
    /// Titles whose upload failed; blank titles appear as `<untitled>`
    pub failed: Vec<String>,
}

/// One normalized search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub title: String,
    pub authors_joined: String,
    pub metadata: serde_json::Value,
    pub content: String,
    pub url: String,
}

/// Normalized response of a store search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Store-reported total, untouched
    pub total: u64,
    /// Store-reported timing, untouched
    pub timing_ms: f64,
    pub items: Vec<SearchItem>,
    /// Always `items.len()`
    pub count: usize,
}
