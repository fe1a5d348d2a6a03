//! Semantic search over the store, normalized into flat result items.

use crate::error::{PaperflowError, Result};
use crate::models::{SearchItem, SearchResult};
use crate::store::{DocumentQuery, MemoryStore, RawSearchDocument};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

const NO_TITLE: &str = "No title";
const NO_AUTHORS: &str = "No authors";

pub struct SearchGateway {
    store: Arc<dyn MemoryStore>,
    /// Restrict searches to this collection, if set
    collection: Option<String>,
}

impl SearchGateway {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store, collection: None }
    }

    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collection = Some(collection.to_string());
        self
    }

    /// Search the store and normalize the hits.
    ///
    /// `total` and `timing_ms` are passed through untouched; `count` is the
    /// number of normalized items. Any store error becomes
    /// `PaperflowError::Search`.
    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchResult> {
        info!(query = query, limit = limit, "Searching store");

        let request = DocumentQuery {
            q: query.to_string(),
            limit,
            container_tags: self.collection.iter().cloned().collect(),
        };

        let response = self.store.search_documents(&request).await.map_err(|e| {
            error!(query = query, error = %e, "Store search failed");
            PaperflowError::Search(e.to_string())
        })?;

        let items: Vec<SearchItem> = response.results.iter().map(normalize).collect();

        info!(total = response.total, count = items.len(), "Search complete");
        Ok(SearchResult {
            total: response.total,
            timing_ms: response.timing,
            count: items.len(),
            items,
        })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn normalize(doc: &RawSearchDocument) -> SearchItem {
    let metadata = doc.metadata.clone().unwrap_or(Value::Null);

    let title = non_empty(doc.title.as_deref())
        .or_else(|| non_empty(metadata.get("title").and_then(Value::as_str)))
        .unwrap_or(NO_TITLE)
        .to_string();

    let authors = match metadata.get("authors") {
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(joined)) => joined.trim().to_string(),
        _ => String::new(),
    };
    let authors_joined = if authors.is_empty() {
        NO_AUTHORS.to_string()
    } else {
        authors
    };

    let content = non_empty(doc.content.as_deref())
        .map(str::to_string)
        .or_else(|| {
            let relevant: Vec<&str> = doc
                .chunks
                .iter()
                .filter(|c| c.is_relevant.unwrap_or(true))
                .map(|c| c.content.trim())
                .filter(|c| !c.is_empty())
                .collect();
            (!relevant.is_empty()).then(|| relevant.join("\n\n"))
        })
        .or_else(|| non_empty(doc.summary.as_deref()).map(str::to_string))
        .unwrap_or_default();

    let url = non_empty(doc.url.as_deref())
        .or_else(|| non_empty(metadata.get("originalUrl").and_then(Value::as_str)))
        .unwrap_or("")
        .to_string();

    SearchItem {
        title,
        authors_joined,
        metadata,
        content,
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentSearchResponse, RawChunk};
    use crate::testing::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_count_is_recomputed_total_passed_through() {
        let store = Arc::new(InMemoryStore::new());
        store.set_search_response(DocumentSearchResponse {
            total: 57,
            timing: 120.0,
            results: (0..30)
                .map(|i| RawSearchDocument {
                    title: Some(format!("Doc {}", i)),
                    ..Default::default()
                })
                .collect(),
        });

        let result = SearchGateway::new(store).search("rag", 30).await.unwrap();
        assert_eq!(result.count, 30);
        assert_eq!(result.items.len(), 30);
        assert_eq!(result.total, 57);
        assert_eq!(result.timing_ms, 120.0);
    }

    #[tokio::test]
    async fn test_store_error_becomes_search_failure() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_search();
        let err = SearchGateway::new(store).search("rag", 5).await.unwrap_err();
        assert!(matches!(err, PaperflowError::Search(_)));
    }

    #[test]
    fn test_normalize_defaults() {
        let item = normalize(&RawSearchDocument::default());
        assert_eq!(item.title, "No title");
        assert_eq!(item.authors_joined, "No authors");
        assert_eq!(item.content, "");
        assert_eq!(item.url, "");
        assert_eq!(item.metadata, Value::Null);
    }

    #[test]
    fn test_normalize_authors_and_fallbacks() {
        let doc = RawSearchDocument {
            metadata: Some(json!({
                "title": "Paper X",
                "authors": ["Ada Lovelace", " Alan Turing "],
                "originalUrl": "https://arxiv.org/pdf/1"
            })),
            chunks: vec![
                RawChunk { content: "relevant".into(), is_relevant: Some(true) },
                RawChunk { content: "noise".into(), is_relevant: Some(false) },
            ],
            ..Default::default()
        };
        let item = normalize(&doc);
        assert_eq!(item.title, "Paper X");
        assert_eq!(item.authors_joined, "Ada Lovelace, Alan Turing");
        assert_eq!(item.content, "relevant");
        assert_eq!(item.url, "https://arxiv.org/pdf/1");

        let joined = RawSearchDocument {
            metadata: Some(json!({"authors": "J Smith, A Doe"})),
            summary: Some("summary text".into()),
            ..Default::default()
        };
        let item = normalize(&joined);
        assert_eq!(item.authors_joined, "J Smith, A Doe");
        assert_eq!(item.content, "summary text");
    }

    #[tokio::test]
    async fn test_collection_scopes_query() {
        let store = Arc::new(InMemoryStore::new());
        store.seed("arxiv-papers", "RAG chunking");
        store.seed("other", "RAG elsewhere");

        let result = SearchGateway::new(store)
            .with_collection("arxiv-papers")
            .search("rag", 10)
            .await
            .unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.items[0].title, "RAG chunking");
    }
}
