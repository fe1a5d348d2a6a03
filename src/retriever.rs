//! Concurrent fan-out over all configured sources.
//!
//! Every adapter runs on its own Tokio task; results are gathered only after
//! all of them settle. A failing, timed-out or panicking source never
//! cancels its siblings and shows up as an empty entry plus a failure note.

use crate::error::PaperflowError;
use crate::models::{PaperRecord, RetrievalBatch};
use crate::sources::{spawn_search, SearchOptions, SourceAdapter};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-source result limit used when no explicit limit is given
pub const DEFAULT_PER_SOURCE_LIMIT: usize = 10;

/// Per-source timeout
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ParallelRetriever {
    sources: Vec<Arc<dyn SourceAdapter>>,
    /// Sources that could not be constructed, with the reason
    unavailable: Vec<(String, String)>,
    source_timeout: Option<Duration>,
}

impl ParallelRetriever {
    pub fn new(sources: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self {
            sources,
            unavailable: Vec::new(),
            source_timeout: Some(DEFAULT_SOURCE_TIMEOUT),
        }
    }

    /// Register a source that failed to build (e.g. missing credential).
    ///
    /// It is reported as failed in every batch instead of silently vanishing.
    pub fn with_unavailable(mut self, name: &str, reason: String) -> Self {
        self.unavailable.push((name.to_string(), reason));
        self
    }

    /// `None` disables the per-source timeout.
    pub fn with_source_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Names of all configured sources, available or not.
    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|s| s.name().to_string())
            .chain(self.unavailable.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    /// Query every source concurrently.
    ///
    /// `limits` maps source name to its result cap; sources without an entry
    /// use `default_limit`. Year bounds are passed to every source.
    pub async fn retrieve_all(
        &self,
        query: &str,
        limits: &HashMap<String, usize>,
        default_limit: usize,
        year_from: Option<i32>,
        year_to: Option<i32>,
    ) -> RetrievalBatch {
        let mut batch = RetrievalBatch::new();

        for (name, reason) in &self.unavailable {
            warn!(source = %name, reason = %reason, "Source unavailable");
            batch.insert_failure(name, reason.clone());
        }

        info!(query = query, sources = self.sources.len(), "Starting parallel retrieval");

        let tasks = self.sources.iter().map(|source| {
            let name = source.name().to_string();
            let limit = limits.get(&name).copied().unwrap_or(default_limit);
            let options = SearchOptions::new(limit).with_years(year_from, year_to);
            let mut handle = spawn_search(Arc::clone(source), query.to_string(), options);
            let timeout = self.source_timeout;

            async move {
                let outcome: Result<Vec<PaperRecord>, String> = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                        Ok(joined) => flatten_join(joined),
                        Err(_) => {
                            handle.abort();
                            Err(format!("timed out after {:?}", limit))
                        }
                    },
                    None => flatten_join(handle.await),
                };
                (name, outcome)
            }
        });

        for (name, outcome) in join_all(tasks).await {
            match outcome {
                Ok(records) => {
                    info!(source = %name, count = records.len(), "Source completed");
                    batch.insert_success(&name, records);
                }
                Err(message) => {
                    let err = PaperflowError::provider(&name, &message);
                    warn!(source = %name, error = %err, "Source failed");
                    batch.insert_failure(&name, message);
                }
            }
        }

        info!(
            total = batch.total(),
            failed = batch.failures.len(),
            "Parallel retrieval complete"
        );
        batch
    }
}

fn flatten_join(
    joined: std::result::Result<crate::error::Result<Vec<PaperRecord>>, tokio::task::JoinError>,
) -> Result<Vec<PaperRecord>, String> {
    match joined {
        Ok(Ok(records)) => Ok(records),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("source task panicked: {}", e)),
    }
}
