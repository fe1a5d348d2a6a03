//! Environment-driven configuration and collaborator construction.

use crate::completion::{LlmConfig, OpenAiCompatibleClient, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL};
use crate::error::{PaperflowError, Result};
use crate::retriever::ParallelRetriever;
use crate::sources::arxiv::{ArxivAdapter, ArxivConfig, DEFAULT_ARXIV_BASE_URL};
use crate::sources::scholar::{ScholarAdapter, ScholarConfig, DEFAULT_SERPAPI_BASE_URL};
use crate::sources::{SourceAdapter, ARXIV, SCHOLAR, SOURCE_PRIORITY};
use crate::store::{StoreConfig, SupermemoryClient, DEFAULT_STORE_BASE_URL};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Collection used when the caller names none
pub const DEFAULT_COLLECTION: &str = "arxiv-papers";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub store_api_key: Option<String>,
    pub store_base_url: String,
    pub serpapi_api_key: Option<String>,
    pub serpapi_base_url: String,
    pub arxiv_base_url: String,
    pub collection: String,
    /// Lower-cased source names to enable; empty enables all
    pub enabled_sources: Vec<String>,
    pub source_timeout: Duration,
    pub llm_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            store_api_key: None,
            store_base_url: DEFAULT_STORE_BASE_URL.to_string(),
            serpapi_api_key: None,
            serpapi_base_url: DEFAULT_SERPAPI_BASE_URL.to_string(),
            arxiv_base_url: DEFAULT_ARXIV_BASE_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            enabled_sources: Vec::new(),
            source_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            llm_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            match get(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| PaperflowError::Configuration(format!("{} must be a number of seconds, got '{}'", key, raw))),
                None => Ok(default),
            }
        };

        let enabled_sources: Vec<String> = get("PAPERFLOW_SOURCES")
            .map(|s| {
                s.split(',')
                    .map(|name| name.trim().to_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if let Some(unknown) = enabled_sources.iter().find(|s| !SOURCE_PRIORITY.contains(&s.as_str())) {
            return Err(PaperflowError::Configuration(format!("Unknown source '{}' in PAPERFLOW_SOURCES", unknown)));
        }

        Ok(Self {
            llm_api_key: get("LLM_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            llm_base_url: get("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_model: get("LLM_MODEL").unwrap_or(defaults.llm_model),
            store_api_key: get("SUPERMEMORY_API_KEY"),
            store_base_url: get("SUPERMEMORY_BASE_URL").unwrap_or(defaults.store_base_url),
            serpapi_api_key: get("SERPAPI_API_KEY"),
            serpapi_base_url: get("SERPAPI_BASE_URL").unwrap_or(defaults.serpapi_base_url),
            arxiv_base_url: get("ARXIV_BASE_URL").unwrap_or(defaults.arxiv_base_url),
            collection: get("PAPERFLOW_COLLECTION").unwrap_or(defaults.collection),
            enabled_sources,
            source_timeout: secs("PAPERFLOW_SOURCE_TIMEOUT_SECS", defaults.source_timeout)?,
            llm_timeout: secs("PAPERFLOW_LLM_TIMEOUT_SECS", defaults.llm_timeout)?,
        })
    }

    fn source_enabled(&self, name: &str) -> bool {
        self.enabled_sources.is_empty() || self.enabled_sources.iter().any(|s| s == name)
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            timeout: self.llm_timeout,
        }
    }

    pub fn build_completion_client(&self) -> Result<OpenAiCompatibleClient> {
        OpenAiCompatibleClient::new(&self.llm_config())
    }

    pub fn build_store(&self) -> Result<SupermemoryClient> {
        SupermemoryClient::new(&StoreConfig {
            base_url: self.store_base_url.clone(),
            api_key: self.store_api_key.clone(),
            ..Default::default()
        })
    }

    /// Build the retriever over every enabled source.
    ///
    /// A source whose construction fails (missing credential) is kept as
    /// unavailable so each batch reports it as failed.
    pub fn build_retriever(&self) -> Result<ParallelRetriever> {
        let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        let mut unavailable = Vec::new();

        if self.source_enabled(ARXIV) {
            sources.push(Arc::new(ArxivAdapter::new(ArxivConfig {
                base_url: self.arxiv_base_url.clone(),
                ..Default::default()
            })?));
        }

        if self.source_enabled(SCHOLAR) {
            let scholar = ScholarAdapter::new(&ScholarConfig {
                base_url: self.serpapi_base_url.clone(),
                api_key: self.serpapi_api_key.clone(),
                ..Default::default()
            });
            match scholar {
                Ok(adapter) => sources.push(Arc::new(adapter)),
                Err(e) => {
                    warn!(source = SCHOLAR, error = %e, "Source disabled");
                    unavailable.push((SCHOLAR, e.to_string()));
                }
            }
        }

        if sources.is_empty() && unavailable.is_empty() {
            return Err(PaperflowError::Configuration("No sources enabled".to_string()));
        }

        let retriever = unavailable
            .into_iter()
            .fold(ParallelRetriever::new(sources), |r, (name, reason)| {
                r.with_unavailable(name, reason)
            });
        Ok(retriever.with_source_timeout(Some(self.source_timeout)))
    }
}
