//! Google Scholar source adapter (via SerpApi).
//!
//! SerpApi returns at most 20 organic results per request, so larger
//! requests walk pages with the `start` offset until the provider stops
//! reporting a next page or `max_results` is reached.

use super::{extract_year, year_regex, SearchOptions, SourceAdapter, SCHOLAR};
use crate::error::{status_error, OptionExt, PaperflowError, Result};
use crate::models::{normalize_whitespace, PaperRecord};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// SerpApi base URL
pub const DEFAULT_SERPAPI_BASE_URL: &str = "https://serpapi.com";

/// Provider page-size cap
const MAX_PAGE_SIZE: usize = 20;

/// Venue reported for every Scholar record
const VENUE: &str = "Google Scholar";

/// Scholar adapter configuration
#[derive(Debug, Clone)]
pub struct ScholarConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERPAPI_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// One fetched page
struct ScholarPage {
    records: Vec<PaperRecord>,
    has_next: bool,
}

pub struct ScholarAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    year_regex: Regex,
}

impl ScholarAdapter {
    /// Build the adapter. Fails fast when `SERPAPI_API_KEY` is absent.
    pub fn new(config: &ScholarConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PaperflowError::missing_credential("SERPAPI_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaperflowError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            year_regex: year_regex()?,
        })
    }

    fn build_page_url(&self, query: &str, start: usize, num: usize, options: &SearchOptions) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/search.json", self.base_url))
            .map_err(|e| PaperflowError::Configuration(format!("Invalid SerpApi base URL: {}", e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("engine", "google_scholar")
                .append_pair("q", query)
                .append_pair("start", &start.to_string())
                .append_pair("num", &num.to_string())
                .append_pair("api_key", &self.api_key);
            if let Some(from) = options.year_from {
                pairs.append_pair("as_ylo", &from.to_string());
            }
            if let Some(to) = options.year_to {
                pairs.append_pair("as_yhi", &to.to_string());
            }
        }

        Ok(url)
    }

    async fn fetch_page(&self, query: &str, start: usize, num: usize, options: &SearchOptions) -> Result<ScholarPage> {
        let url = self.build_page_url(query, start, num, options)?;
        debug!(start = start, num = num, "Fetching Scholar page");

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PaperflowError::Parse(format!("Failed to parse SerpApi response: {}", e)))?;

        if let Some(message) = body.get("error").and_then(Value::as_str) {
            if message.contains("hasn't returned any results") {
                return Ok(ScholarPage {
                    records: Vec::new(),
                    has_next: false,
                });
            }
            return Err(PaperflowError::Api {
                code: status.as_u16(),
                message: message.to_string(),
            });
        }

        let records = body
            .get("organic_results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, item)| match parse_organic_result(item, &self.year_regex) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!(idx = idx, error = %e, "Skipping Scholar result");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let has_next = body
            .get("serpapi_pagination")
            .and_then(|p| p.get("next"))
            .is_some_and(|next| !next.is_null());

        Ok(ScholarPage { records, has_next })
    }
}

#[async_trait]
impl SourceAdapter for ScholarAdapter {
    fn name(&self) -> &str {
        SCHOLAR
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<PaperRecord>> {
        info!(query = query, max_results = options.max_results, "Starting Scholar query");

        let mut records: Vec<PaperRecord> = Vec::new();
        let mut start = 0;

        while records.len() < options.max_results {
            let num = MAX_PAGE_SIZE.min(options.max_results - records.len());

            let page = match self.fetch_page(query, start, num, options).await {
                Ok(page) => page,
                Err(e) if records.is_empty() => return Err(PaperflowError::provider(SCHOLAR, e)),
                Err(e) => {
                    warn!(error = %e, kept = records.len(), "Scholar page failed, keeping partial results");
                    break;
                }
            };

            let fetched = page.records.len();
            records.extend(page.records);
            info!(start = start, fetched = fetched, total = records.len(), "Scholar page fetched");

            if fetched == 0 || !page.has_next {
                break;
            }
            start += num;
        }

        records.truncate(options.max_results);
        info!(count = records.len(), "Scholar query complete");
        Ok(records)
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Normalize one `organic_results[]` entry.
fn parse_organic_result(item: &Value, year_regex: &Regex) -> Result<PaperRecord> {
    let title = str_field(item, "title")
        .map(normalize_whitespace)
        .ok_or_parse("result has no title")?;

    let publication = item.get("publication_info");
    let summary = publication.and_then(|p| str_field(p, "summary")).unwrap_or("");

    let mut authors: Vec<String> = publication
        .and_then(|p| p.get("authors"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|a| str_field(a, "name"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if authors.is_empty() && !summary.is_empty() {
        authors = summary
            .split(" - ")
            .next()
            .unwrap_or("")
            .split(',')
            .map(|a| a.trim().trim_end_matches('…').trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
    }

    let pdf_url = item
        .get("resources")
        .and_then(Value::as_array)
        .and_then(|resources| {
            resources
                .iter()
                .find(|r| str_field(r, "file_format") == Some("PDF"))
        })
        .and_then(|r| str_field(r, "link"))
        .map(str::to_string);

    let citation_count = item
        .get("inline_links")
        .and_then(|l| l.get("cited_by"))
        .and_then(|c| c.get("total"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(PaperRecord {
        title,
        authors,
        abstract_or_summary: str_field(item, "snippet").map(normalize_whitespace).unwrap_or_default(),
        year: extract_year(year_regex, summary),
        venue_or_source: VENUE.to_string(),
        url: str_field(item, "link").unwrap_or("").to_string(),
        pdf_url,
        citation_count,
        categories: BTreeSet::new(),
        source_provider_name: SCHOLAR.to_string(),
    })
}
