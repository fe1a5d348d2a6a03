//! In-crate fakes for the pipeline's collaborator traits.

use crate::completion::CompletionService;
use crate::error::{PaperflowError, Result};
use crate::models::PaperRecord;
use crate::sources::{SearchOptions, SourceAdapter};
use crate::store::{
    DocumentQuery, DocumentSearchResponse, ListOptions, MemoryPage, MemoryRecord, MemoryStore, Pagination,
    RawSearchDocument,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// Completion service returning a fixed reply and recording user texts.
pub struct ScriptedCompletion {
    reply: Option<String>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _system_instruction: &str, user_text: &str) -> Result<String> {
        self.requests.lock().unwrap().push(user_text.to_string());
        self.reply.clone().ok_or(PaperflowError::Api {
            code: 503,
            message: "unavailable".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn paper(source: &str, title: &str, idx: usize) -> PaperRecord {
    PaperRecord {
        title: title.to_string(),
        authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
        abstract_or_summary: format!("Abstract of {}", title),
        year: Some(2024),
        venue_or_source: source.to_string(),
        url: format!("https://example.org/{}/{}", source, idx),
        pdf_url: None,
        citation_count: 0,
        categories: Default::default(),
        source_provider_name: source.to_string(),
    }
}

/// Source returning canned records in order.
pub struct StaticSource {
    name: String,
    records: Vec<PaperRecord>,
}

impl StaticSource {
    pub fn with_titles(name: &str, titles: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            records: titles
                .iter()
                .enumerate()
                .map(|(i, t)| paper(name, t, i))
                .collect(),
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str, options: &SearchOptions) -> Result<Vec<PaperRecord>> {
        Ok(self.records.iter().take(options.max_results).cloned().collect())
    }
}

/// Source that always fails.
pub struct FailingSource {
    name: String,
}

impl FailingSource {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl SourceAdapter for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<Vec<PaperRecord>> {
        Err(PaperflowError::provider(&self.name, "connection refused"))
    }
}

/// Source that sleeps before returning nothing.
pub struct SlowSource {
    name: String,
    delay: Duration,
}

impl SlowSource {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl SourceAdapter for SlowSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<Vec<PaperRecord>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

struct StoredMemory {
    record: MemoryRecord,
    content: String,
}

#[derive(Default)]
struct StoreState {
    memories: Vec<StoredMemory>,
    list_calls: usize,
    add_calls: usize,
    failing_titles: HashSet<String>,
    fail_listing: bool,
    fail_listing_page: Option<usize>,
    fail_search: bool,
    search_response: Option<DocumentSearchResponse>,
}

/// Memory store kept in a `Vec`, newest last.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a processed document titled `title`; returns its id.
    pub fn seed(&self, collection: &str, title: &str) -> String {
        let mut metadata = Map::new();
        metadata.insert("type".into(), json!("url"));
        metadata.insert("title".into(), json!(title));
        let mut state = self.state.lock().unwrap();
        let id = format!("mem_{}", state.memories.len() + 1);
        state.memories.push(StoredMemory {
            record: MemoryRecord {
                id: id.clone(),
                status: Some("done".into()),
                title: None,
                metadata: Some(metadata),
                container_tags: vec![collection.to_string()],
                updated_at: None,
            },
            content: String::new(),
        });
        id
    }

    /// Make `add_memory` fail for records titled `title`.
    pub fn fail_add_for(&self, title: &str) {
        self.state.lock().unwrap().failing_titles.insert(title.to_string());
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    /// Fail every listing request for `page` or later.
    pub fn fail_listing_from_page(&self, page: usize) {
        self.state.lock().unwrap().fail_listing_page = Some(page);
    }

    pub fn fail_search(&self) {
        self.state.lock().unwrap().fail_search = true;
    }

    /// Answer every search with this response instead of matching stored documents.
    pub fn set_search_response(&self, response: DocumentSearchResponse) {
        self.state.lock().unwrap().search_response = Some(response);
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().unwrap().add_calls
    }

    /// Titles of documents in `collection`, in insertion order.
    pub fn titles(&self, collection: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .memories
            .iter()
            .filter(|m| m.record.container_tags.iter().any(|t| t == collection))
            .filter_map(|m| m.record.paper_title().map(str::to_string))
            .collect()
    }

    /// Metadata of the most recently added document.
    pub fn last_metadata(&self) -> Option<Map<String, Value>> {
        self.state
            .lock()
            .unwrap()
            .memories
            .last()
            .and_then(|m| m.record.metadata.clone())
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn add_memory(&self, content: &str, container_tag: &str, metadata: Map<String, Value>) -> Result<MemoryRecord> {
        let mut state = self.state.lock().unwrap();
        state.add_calls += 1;

        let title = metadata.get("title").and_then(Value::as_str).unwrap_or("").to_string();
        if state.failing_titles.contains(&title) {
            return Err(PaperflowError::Api {
                code: 500,
                message: "upload rejected".to_string(),
            });
        }

        let record = MemoryRecord {
            id: format!("mem_{}", state.memories.len() + 1),
            status: Some("queued".into()),
            title: None,
            metadata: Some(metadata),
            container_tags: vec![container_tag.to_string()],
            updated_at: None,
        };
        state.memories.push(StoredMemory {
            record: record.clone(),
            content: content.to_string(),
        });
        Ok(record)
    }

    async fn get_memory(&self, id: &str) -> Result<MemoryRecord> {
        self.state
            .lock()
            .unwrap()
            .memories
            .iter()
            .find(|m| m.record.id == id)
            .map(|m| m.record.clone())
            .ok_or(PaperflowError::Api {
                code: 404,
                message: "not found".to_string(),
            })
    }

    async fn list_memories(&self, options: &ListOptions) -> Result<MemoryPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        let page_fails = state.fail_listing_page.is_some_and(|from| options.page >= from);
        if state.fail_listing || page_fails {
            return Err(PaperflowError::Api {
                code: 500,
                message: "list failed".to_string(),
            });
        }

        // newest first, like `updatedAt desc`
        let matching: Vec<MemoryRecord> = state
            .memories
            .iter()
            .rev()
            .filter(|m| m.record.container_tags.iter().any(|t| options.container_tags.contains(t)))
            .map(|m| m.record.clone())
            .collect();

        let limit = options.limit.max(1);
        let total_pages = matching.len().div_ceil(limit) as u64;
        let memories = matching
            .into_iter()
            .skip((options.page.max(1) - 1) * limit)
            .take(limit)
            .collect();

        Ok(MemoryPage {
            memories,
            pagination: Some(Pagination {
                current_page: options.page as u64,
                total_pages,
            }),
        })
    }

    async fn search_documents(&self, query: &DocumentQuery) -> Result<DocumentSearchResponse> {
        let state = self.state.lock().unwrap();
        if state.fail_search {
            return Err(PaperflowError::Api {
                code: 503,
                message: "search unavailable".to_string(),
            });
        }
        if let Some(response) = &state.search_response {
            return Ok(response.clone());
        }

        let terms: Vec<String> = query.q.to_lowercase().split_whitespace().map(str::to_string).collect();
        let hits: Vec<RawSearchDocument> = state
            .memories
            .iter()
            .filter(|m| {
                query.container_tags.is_empty()
                    || m.record.container_tags.iter().any(|t| query.container_tags.contains(t))
            })
            .filter(|m| {
                let haystack = format!(
                    "{} {}",
                    m.record.paper_title().unwrap_or(""),
                    m.record
                        .metadata
                        .as_ref()
                        .and_then(|md| md.get("summary"))
                        .and_then(Value::as_str)
                        .unwrap_or("")
                )
                .to_lowercase();
                terms.is_empty() || terms.iter().any(|t| haystack.contains(t.as_str()))
            })
            .map(|m| RawSearchDocument {
                document_id: Some(m.record.id.clone()),
                title: m.record.paper_title().map(str::to_string),
                metadata: m.record.metadata.clone().map(Value::Object),
                content: Some(m.content.clone()),
                ..Default::default()
            })
            .collect();

        Ok(DocumentSearchResponse {
            total: hits.len() as u64,
            timing: 1.0,
            results: hits.into_iter().take(query.limit).collect(),
        })
    }
}
