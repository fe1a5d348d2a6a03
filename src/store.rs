//! External memory/search store.
//!
//! The store is opaque: paperflow only adds, reads, lists and searches
//! documents, and never caches anything locally. [`SupermemoryClient`] is
//! the HTTP implementation; the helpers at the bottom derive document
//! listings and the existing-title set from the raw operations.

use crate::error::{status_error, PaperflowError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Supermemory API base URL
pub const DEFAULT_STORE_BASE_URL: &str = "https://api.supermemory.ai";

/// Page size used when collecting existing titles
const LIST_PAGE_SIZE: usize = 100;

/// Upper bound on pages walked when collecting existing titles
const MAX_LIST_PAGES: usize = 500;

/// A stored memory/document as reported by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub container_tags: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl MemoryRecord {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Title used for duplicate detection.
    ///
    /// The title we uploaded in metadata wins over whatever the store
    /// derived from the document content.
    pub fn paper_title(&self) -> Option<&str> {
        self.metadata_str("title")
            .or(self.title.as_deref().filter(|t| !t.trim().is_empty()))
            .or_else(|| self.metadata_str("originalName"))
            .map(str::trim)
    }

    /// Title for listings, falling back to "Untitled".
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.metadata_str("originalName"))
            .or_else(|| self.metadata_str("title"))
            .unwrap_or("Untitled")
    }
}

/// Options for listing memories
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    pub container_tags: Vec<String>,
    pub limit: usize,
    pub page: usize,
    pub sort: String,
    pub order: String,
}

impl ListOptions {
    /// Most recently updated first, as the store's UI lists them.
    pub fn recent(collection: &str, limit: usize) -> Self {
        Self {
            container_tags: vec![collection.to_string()],
            limit,
            page: 1,
            sort: "updatedAt".to_string(),
            order: "desc".to_string(),
        }
    }
}

/// One page of listed memories
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryPage {
    #[serde(default)]
    pub memories: Vec<MemoryRecord>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u64,
    #[serde(default)]
    pub total_pages: u64,
}

/// Document search request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    pub q: String,
    pub limit: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub container_tags: Vec<String>,
}

/// Raw document search response, before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSearchResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub timing: f64,
    #[serde(default)]
    pub results: Vec<RawSearchDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchDocument {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub chunks: Vec<RawChunk>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChunk {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_relevant: Option<bool>,
}

/// Operations paperflow needs from the external store.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn add_memory(
        &self,
        content: &str,
        container_tag: &str,
        metadata: Map<String, Value>,
    ) -> Result<MemoryRecord>;

    async fn get_memory(&self, id: &str) -> Result<MemoryRecord>;

    async fn list_memories(&self, options: &ListOptions) -> Result<MemoryPage>;

    async fn search_documents(&self, query: &DocumentQuery) -> Result<DocumentSearchResponse>;
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STORE_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Supermemory HTTP client
pub struct SupermemoryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupermemoryClient {
    /// Build the client. Fails fast when `SUPERMEMORY_API_KEY` is absent.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PaperflowError::missing_credential("SUPERMEMORY_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaperflowError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| PaperflowError::Parse(format!("Failed to parse store response: {}", e)))
    }
}

#[async_trait]
impl MemoryStore for SupermemoryClient {
    async fn add_memory(
        &self,
        content: &str,
        container_tag: &str,
        metadata: Map<String, Value>,
    ) -> Result<MemoryRecord> {
        let body = serde_json::json!({
            "content": content,
            "containerTag": container_tag,
            "metadata": metadata,
        });
        debug!(content = content, container_tag = container_tag, "Adding memory");
        self.send(self.client.post(format!("{}/v3/memories", self.base_url)).json(&body))
            .await
    }

    async fn get_memory(&self, id: &str) -> Result<MemoryRecord> {
        self.send(self.client.get(format!("{}/v3/memories/{}", self.base_url, id)))
            .await
    }

    async fn list_memories(&self, options: &ListOptions) -> Result<MemoryPage> {
        self.send(
            self.client
                .post(format!("{}/v3/memories/list", self.base_url))
                .json(options),
        )
        .await
    }

    async fn search_documents(&self, query: &DocumentQuery) -> Result<DocumentSearchResponse> {
        self.send(self.client.post(format!("{}/v3/search", self.base_url)).json(query))
            .await
    }
}

/// Processing status of one stored document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatus {
    pub id: String,
    pub status: String,
    pub title: Option<String>,
    pub progress: f64,
}

/// Listing entry for one stored document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub uploaded_at: Option<String>,
    pub status: Option<String>,
    pub url: Option<String>,
}

/// Look up processing status and progress of a document.
pub async fn document_status(store: &dyn MemoryStore, id: &str) -> Result<DocumentStatus> {
    let memory = store.get_memory(id).await?;
    let progress = memory
        .metadata
        .as_ref()
        .and_then(|m| m.get("progress"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Ok(DocumentStatus {
        id: memory.id.clone(),
        status: memory.status.clone().unwrap_or_else(|| "unknown".to_string()),
        title: memory.title.clone(),
        progress,
    })
}

/// List the most recently updated documents of a collection.
pub async fn list_documents(
    store: &dyn MemoryStore,
    collection: &str,
    limit: usize,
) -> Result<Vec<DocumentSummary>> {
    let page = store.list_memories(&ListOptions::recent(collection, limit)).await?;

    Ok(page
        .memories
        .iter()
        .map(|m| DocumentSummary {
            id: m.id.clone(),
            title: m.display_title().to_string(),
            kind: m
                .metadata_str("fileType")
                .or_else(|| m.metadata_str("type"))
                .unwrap_or("unknown")
                .to_string(),
            uploaded_at: m.metadata_str("uploadedAt").map(str::to_string),
            status: m.status.clone(),
            url: m.metadata_str("originalUrl").map(str::to_string),
        })
        .collect())
}

/// Collect the trimmed titles of every document in a collection.
///
/// Walks all pages so large collections are fully covered. A failure on the
/// first page is returned; a failure on a later page ends the walk with the
/// titles read so far.
pub async fn existing_titles(store: &dyn MemoryStore, collection: &str) -> Result<HashSet<String>> {
    let mut titles = HashSet::new();
    let mut options = ListOptions::recent(collection, LIST_PAGE_SIZE);

    loop {
        let page = match store.list_memories(&options).await {
            Ok(page) => page,
            Err(e) if options.page > 1 => {
                warn!(
                    collection = collection,
                    page = options.page,
                    error = %e,
                    "Title listing failed part way, keeping titles already read"
                );
                break;
            }
            Err(e) => return Err(e),
        };
        let fetched = page.memories.len();

        titles.extend(
            page.memories
                .iter()
                .filter_map(MemoryRecord::paper_title)
                .map(str::to_string),
        );

        let more_pages = match &page.pagination {
            Some(p) if p.total_pages > 0 => (options.page as u64) < p.total_pages,
            _ => fetched >= options.limit,
        };
        if !more_pages || fetched == 0 || options.page >= MAX_LIST_PAGES {
            break;
        }
        options.page += 1;
    }

    info!(collection = collection, count = titles.len(), "Loaded existing titles");
    Ok(titles)
}
