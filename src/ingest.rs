//! Title-deduplicated ingestion of retrieved papers into the store.
//!
//! The existing-title set is read once per pass, before any write. Uploads
//! are sequential so the set stays authoritative for the whole pass.

use crate::error::PaperflowError;
use crate::models::{IngestionOutcome, PaperRecord, RetrievalBatch};
use crate::sources::SOURCE_PRIORITY;
use crate::store::{existing_titles, MemoryStore};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry recorded in `IngestionOutcome::failed` for records with a blank title
pub const UNTITLED: &str = "<untitled>";

pub struct DeduplicatingIngestor {
    store: Arc<dyn MemoryStore>,
}

impl DeduplicatingIngestor {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Upload every record of `batch` whose trimmed title is not yet in
    /// `collection`.
    ///
    /// Per-record upload failures are logged and recorded in
    /// `IngestionOutcome::failed`; they never abort the pass. Records with a
    /// blank title are never uploaded and count as failed, so every
    /// candidate lands in exactly one of the three lists.
    pub async fn ingest(&self, batch: &RetrievalBatch, collection: &str) -> IngestionOutcome {
        let candidates = batch.flatten(SOURCE_PRIORITY);
        let mut outcome = IngestionOutcome::default();

        if candidates.is_empty() {
            info!(collection = collection, "Nothing to ingest");
            return outcome;
        }

        let mut seen = match existing_titles(self.store.as_ref(), collection).await {
            Ok(titles) => titles,
            Err(e) => {
                warn!(collection = collection, error = %e, "Could not list existing documents, assuming none");
                HashSet::new()
            }
        };

        info!(
            collection = collection,
            candidates = candidates.len(),
            existing = seen.len(),
            "Starting ingestion"
        );

        for record in candidates {
            let key = record.dedup_key();
            if key.is_empty() {
                warn!(url = %record.url, "Record without title, counting as failed");
                outcome.failed.push(UNTITLED.to_string());
                continue;
            }
            if seen.contains(key) {
                debug!(title = key, "Already ingested, skipping");
                outcome.skipped.push(key.to_string());
                continue;
            }

            match self
                .store
                .add_memory(record.canonical_url(), collection, upload_metadata(record))
                .await
            {
                Ok(memory) => {
                    info!(title = key, id = %memory.id, source = %record.source_provider_name, "Uploaded paper");
                    seen.insert(key.to_string());
                    outcome.uploaded.push(record.clone());
                }
                Err(e) => {
                    let err = PaperflowError::IngestionItem {
                        title: key.to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "Upload failed, continuing");
                    outcome.failed.push(key.to_string());
                }
            }
        }

        info!(
            collection = collection,
            uploaded = outcome.uploaded.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "Ingestion complete"
        );
        outcome
    }
}

/// Metadata stored alongside each uploaded paper.
pub fn upload_metadata(record: &PaperRecord) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("type".into(), json!("url"));
    metadata.insert("originalUrl".into(), json!(record.canonical_url()));
    metadata.insert("uploadedAt".into(), json!(Utc::now().to_rfc3339()));
    metadata.insert("title".into(), json!(record.dedup_key()));
    metadata.insert("authors".into(), json!(record.authors.join(", ")));
    metadata.insert("summary".into(), json!(record.abstract_or_summary));
    metadata.insert(
        "categories".into(),
        json!(record.categories.iter().cloned().collect::<Vec<_>>().join(", ")),
    );
    metadata.insert("source".into(), json!(record.source_provider_name));
    metadata.insert("venue".into(), json!(record.venue_or_source));
    if let Some(year) = record.year {
        metadata.insert("year".into(), json!(year));
    }
    metadata.insert("citationCount".into(), json!(record.citation_count));
    metadata
}
