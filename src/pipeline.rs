//! Formulate -> retrieve -> ingest -> search, as one request.
//!
//! Every stage gets its collaborators injected; nothing is kept between
//! runs except what the store itself holds.

use crate::error::Result;
use crate::formulator::QueryFormulator;
use crate::gateway::SearchGateway;
use crate::ingest::DeduplicatingIngestor;
use crate::models::SearchResult;
use crate::retriever::ParallelRetriever;
use crate::store::MemoryStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// One pipeline request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Natural-language research request
    pub query: String,
    /// Result cap per source, also used as the search limit
    pub max_results: usize,
    pub collection: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub query: String,
    pub formulated_query: String,
    pub scraped_count: usize,
    pub ingested_count: usize,
    pub skipped_count: usize,
    /// Source name -> failure description
    pub source_failures: BTreeMap<String, String>,
    pub search_results: SearchResult,
}

pub struct Pipeline {
    formulator: QueryFormulator,
    retriever: ParallelRetriever,
    store: Arc<dyn MemoryStore>,
}

impl Pipeline {
    pub fn new(formulator: QueryFormulator, retriever: ParallelRetriever, store: Arc<dyn MemoryStore>) -> Self {
        Self {
            formulator,
            retriever,
            store,
        }
    }

    /// Gateway over the pipeline's store, scoped to `collection`.
    pub fn gateway(&self, collection: &str) -> SearchGateway {
        SearchGateway::new(Arc::clone(&self.store)).with_collection(collection)
    }

    /// Run the whole pipeline.
    ///
    /// Formulation and search failures end the run; source and upload
    /// failures are absorbed into the report.
    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineReport> {
        info!(query = %request.query, collection = %request.collection, "Pipeline started");

        let formulated = self.formulator.formulate(&request.query).await?;

        let batch = self
            .retriever
            .retrieve_all(
                &formulated,
                &HashMap::new(),
                request.max_results,
                request.year_from,
                request.year_to,
            )
            .await;
        let scraped_count = batch.total();

        let outcome = DeduplicatingIngestor::new(Arc::clone(&self.store))
            .ingest(&batch, &request.collection)
            .await;

        let search_results = self
            .gateway(&request.collection)
            .search(&request.query, request.max_results)
            .await?;

        info!(
            scraped = scraped_count,
            ingested = outcome.uploaded.len(),
            skipped = outcome.skipped.len(),
            results = search_results.count,
            "Pipeline finished"
        );

        Ok(PipelineReport {
            query: request.query.clone(),
            formulated_query: formulated,
            scraped_count,
            ingested_count: outcome.uploaded.len(),
            skipped_count: outcome.skipped.len(),
            source_failures: batch.failures.into_iter().collect(),
            search_results,
        })
    }
}
