//! arXiv source adapter.
//!
//! Queries the export API (Atom feed) with a single request for the desired
//! number of results. When the API fails or comes back empty, the public
//! search listing can be scraped as a fallback.

use super::{extract_year, year_regex, SearchOptions, SourceAdapter, ARXIV};
use crate::error::{status_error, PaperflowError, Result};
use crate::models::{normalize_whitespace, PaperRecord};
use crate::query_grammar::{self, Token};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// arXiv export API base URL
pub const DEFAULT_ARXIV_BASE_URL: &str = "https://export.arxiv.org";

/// arXiv website, used for the listing fallback
pub const DEFAULT_ARXIV_LISTING_URL: &str = "https://arxiv.org";

/// Venue reported for every arXiv record
const VENUE: &str = "arXiv";

/// Page sizes the listing page accepts
const LISTING_SIZES: &[usize] = &[25, 50, 100, 200];

/// Sort criterion understood by the export API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortCriterion {
    #[default]
    SubmittedDate,
    LastUpdatedDate,
    Relevance,
}

impl SortCriterion {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortCriterion::SubmittedDate => "submittedDate",
            SortCriterion::LastUpdatedDate => "lastUpdatedDate",
            SortCriterion::Relevance => "relevance",
        }
    }
}

impl std::str::FromStr for SortCriterion {
    type Err = PaperflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "submitted" | "submitteddate" => Ok(SortCriterion::SubmittedDate),
            "updated" | "lastupdateddate" => Ok(SortCriterion::LastUpdatedDate),
            "relevance" => Ok(SortCriterion::Relevance),
            other => Err(PaperflowError::Configuration(format!("Unknown arXiv sort order: {}", other))),
        }
    }
}

/// arXiv adapter configuration
#[derive(Debug, Clone)]
pub struct ArxivConfig {
    pub base_url: String,
    pub listing_url: String,
    pub sort_by: SortCriterion,
    /// Scrape the search listing when the API yields nothing
    pub listing_fallback: bool,
    pub timeout: Duration,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARXIV_BASE_URL.to_string(),
            listing_url: DEFAULT_ARXIV_LISTING_URL.to_string(),
            sort_by: SortCriterion::default(),
            listing_fallback: true,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct ArxivAdapter {
    client: reqwest::Client,
    config: ArxivConfig,
}

impl ArxivAdapter {
    pub fn new(config: ArxivConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("paperflow/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaperflowError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the export API URL for one request.
    fn build_query_url(&self, query: &str, options: &SearchOptions) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/api/query", self.config.base_url.trim_end_matches('/')))
            .map_err(|e| PaperflowError::Configuration(format!("Invalid arXiv base URL: {}", e)))?;

        let search_query = match date_clause(options) {
            Some(clause) => format!("({}) AND {}", query, clause),
            None => query.to_string(),
        };

        url.query_pairs_mut()
            .append_pair("search_query", &search_query)
            .append_pair("start", "0")
            .append_pair("max_results", &options.max_results.to_string())
            .append_pair("sortBy", self.config.sort_by.as_param())
            .append_pair("sortOrder", "descending");

        Ok(url)
    }

    fn build_listing_url(&self, query: &str, size: usize) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/search/", self.config.listing_url.trim_end_matches('/')))
            .map_err(|e| PaperflowError::Configuration(format!("Invalid arXiv listing URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("query", &plain_terms(query))
            .append_pair("searchtype", "all")
            .append_pair("abstracts", "show")
            .append_pair("order", "-announced_date_first")
            .append_pair("size", &size.to_string());

        Ok(url)
    }

    async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(response.text().await?)
    }

    async fn search_api(&self, query: &str, options: &SearchOptions) -> Result<Vec<PaperRecord>> {
        let url = self.build_query_url(query, options)?;
        debug!(url = %url, "Fetching arXiv feed");
        let xml = self.fetch_text(&url).await?;
        let mut records = parse_atom_feed(&xml)?;
        records.truncate(options.max_results);
        Ok(records)
    }

    async fn search_listing(&self, query: &str, options: &SearchOptions) -> Result<Vec<PaperRecord>> {
        let size = LISTING_SIZES
            .iter()
            .copied()
            .find(|s| *s >= options.max_results)
            .unwrap_or(200);
        let url = self.build_listing_url(query, size)?;
        debug!(url = %url, "Fetching arXiv listing");
        let html = self.fetch_text(&url).await?;
        let mut records = parse_listing(&html)?;
        records.retain(|r| within_years(r, options));
        records.truncate(options.max_results);
        Ok(records)
    }
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn name(&self) -> &str {
        ARXIV
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<PaperRecord>> {
        if options.max_results == 0 {
            return Ok(Vec::new());
        }

        info!(query = query, max_results = options.max_results, "Starting arXiv query");

        let api_error = match self.search_api(query, options).await {
            Ok(records) if !records.is_empty() => {
                info!(count = records.len(), "arXiv query complete");
                return Ok(records);
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "arXiv API request failed");
                Some(e)
            }
        };

        if !self.config.listing_fallback {
            return match api_error {
                Some(e) => Err(PaperflowError::provider(ARXIV, e)),
                None => Ok(Vec::new()),
            };
        }

        info!("Falling back to arXiv search listing");
        match self.search_listing(query, options).await {
            Ok(records) => {
                info!(count = records.len(), "arXiv listing complete");
                Ok(records)
            }
            Err(e) => {
                warn!(error = %e, "arXiv listing failed");
                match api_error {
                    Some(api) => Err(PaperflowError::provider(ARXIV, api)),
                    None => Ok(Vec::new()),
                }
            }
        }
    }
}

/// `submittedDate` range clause for the year filter, if any.
fn date_clause(options: &SearchOptions) -> Option<String> {
    if options.year_from.is_none() && options.year_to.is_none() {
        return None;
    }
    let from = options.year_from.unwrap_or(1991);
    let to = options.year_to.unwrap_or(9999);
    Some(format!("submittedDate:[{}01010000 TO {}12312359]", from, to))
}

fn within_years(record: &PaperRecord, options: &SearchOptions) -> bool {
    match record.year {
        Some(year) => {
            options.year_from.map_or(true, |from| year >= from)
                && options.year_to.map_or(true, |to| year <= to)
        }
        None => true,
    }
}

/// Reduce a formulated query to the keywords the listing search understands.
fn plain_terms(query: &str) -> String {
    let Ok(tokens) = query_grammar::tokenize(query) else {
        return query.to_string();
    };

    let terms: Vec<String> = tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Term { field, value } if field != "cat" => Some(value.trim_matches('"').to_string()),
            Token::Phrase(p) | Token::Word(p) => Some(p),
            _ => None,
        })
        .collect();

    if terms.is_empty() {
        query.to_string()
    } else {
        terms.join(" ")
    }
}

/// Strip the version suffix from an arXiv identifier (`2301.12345v2` -> `2301.12345`).
fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(idx) if idx > 0 && id[idx + 1..].chars().all(|c| c.is_ascii_digit()) && idx + 1 < id.len() => {
            &id[..idx]
        }
        _ => id,
    }
}

/// Identifier part of an abs link, keeping old-style archive prefixes
/// (`.../abs/hep-th/9901001v1` -> `hep-th/9901001v1`).
fn listing_id(href: &str) -> &str {
    match href.split_once("/abs/") {
        Some((_, id)) => id.trim_matches('/'),
        None => href.rsplit('/').next().unwrap_or(""),
    }
}

/// Entry fields collected while walking the Atom feed
#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    abs_url: String,
    pdf_url: String,
    categories: BTreeSet<String>,
}

impl EntryBuilder {
    fn take_link(&mut self, e: &BytesStart) {
        let mut href = String::new();
        let mut title = String::new();
        let mut rel = String::new();
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).to_string();
            match attr.key.as_ref() {
                b"href" => href = value,
                b"title" => title = value,
                b"rel" => rel = value,
                _ => {}
            }
        }
        if title == "pdf" {
            self.pdf_url = href;
        } else if rel == "alternate" || (self.abs_url.is_empty() && href.contains("/abs/")) {
            self.abs_url = href;
        }
    }

    fn take_category(&mut self, e: &BytesStart) {
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"term" {
                let term = String::from_utf8_lossy(&attr.value).trim().to_string();
                if !term.is_empty() {
                    self.categories.insert(term);
                }
            }
        }
    }

    /// Finish the entry; `None` when it lacks an id or title.
    fn build(self) -> Option<PaperRecord> {
        let title = normalize_whitespace(&self.title);
        let raw_id = self.id.trim();
        let arxiv_id = raw_id.rsplit("/abs/").next().unwrap_or(raw_id);
        if title.is_empty() || arxiv_id.is_empty() {
            return None;
        }

        let url = if self.abs_url.is_empty() {
            raw_id.to_string()
        } else {
            self.abs_url
        };
        let pdf_url = if self.pdf_url.is_empty() {
            format!("https://arxiv.org/pdf/{}", arxiv_id)
        } else {
            self.pdf_url
        };

        Some(PaperRecord {
            title,
            authors: self.authors,
            abstract_or_summary: normalize_whitespace(&self.summary),
            year: self.published.get(..4).and_then(|y| y.parse().ok()),
            venue_or_source: VENUE.to_string(),
            url,
            pdf_url: Some(pdf_url),
            citation_count: 0,
            categories: self.categories,
            source_provider_name: ARXIV.to_string(),
        })
    }
}

/// Parse an arXiv Atom feed into records.
///
/// Entries without an id or title are skipped. A syntax error part-way
/// through keeps the entries parsed so far.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut records = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut current_tag = String::new();
    let mut author_name = String::new();
    let mut in_author = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" {
                    entry = Some(EntryBuilder::default());
                } else if let Some(builder) = entry.as_mut() {
                    match tag.as_str() {
                        "author" => {
                            in_author = true;
                            author_name.clear();
                        }
                        "link" => builder.take_link(&e),
                        "category" => builder.take_category(&e),
                        _ => {}
                    }
                    current_tag = tag;
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(builder) = entry.as_mut() {
                    match e.name().as_ref() {
                        b"link" => builder.take_link(&e),
                        b"category" => builder.take_category(&e),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(builder) = entry.as_mut() {
                    let text = e.unescape().map(|t| t.to_string()).unwrap_or_default();
                    match current_tag.as_str() {
                        "id" => builder.id.push_str(&text),
                        "title" => builder.title.push_str(&text),
                        "summary" => builder.summary.push_str(&text),
                        "published" => builder.published.push_str(&text),
                        "name" if in_author => author_name.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" {
                    if let Some(builder) = entry.take() {
                        match builder.build() {
                            Some(record) => records.push(record),
                            None => warn!("Skipping arXiv entry without id or title"),
                        }
                    }
                } else if tag == "author" && in_author {
                    in_author = false;
                    let name = normalize_whitespace(&author_name);
                    if let (Some(builder), false) = (entry.as_mut(), name.is_empty()) {
                        builder.authors.push(name);
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                if records.is_empty() {
                    return Err(PaperflowError::Parse(format!("XML parse error: {}", e)));
                }
                warn!(error = %e, kept = records.len(), "arXiv feed truncated by XML error");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PaperflowError::Parse(e.to_string()))
}

fn element_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Parse the arXiv search listing page (`li.arxiv-result` items).
pub fn parse_listing(html: &str) -> Result<Vec<PaperRecord>> {
    let document = Html::parse_document(html);

    let item_selector = selector("li.arxiv-result")?;
    let link_selector = selector("p.list-title a")?;
    let title_selector = selector("p.title")?;
    let authors_selector = selector("p.authors a")?;
    let abstract_full_selector = selector("span.abstract-full")?;
    let abstract_selector = selector("p.abstract")?;
    let date_selector = selector("p.is-size-7")?;
    let category_selector = selector("span.tag.is-link")?;

    let year_regex = year_regex()?;
    let mut records = Vec::new();

    for (idx, item) in document.select(&item_selector).enumerate() {
        let href = item
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("");
        let arxiv_id = strip_version(listing_id(href));

        let title = item
            .select(&title_selector)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let authors: Vec<String> = item
            .select(&authors_selector)
            .map(element_text)
            .filter(|a| !a.is_empty())
            .collect();

        if arxiv_id.is_empty() || title.is_empty() || authors.is_empty() {
            warn!(idx = idx, "Skipping malformed arXiv listing item");
            continue;
        }

        let summary = item
            .select(&abstract_full_selector)
            .next()
            .map(element_text)
            .map(|s| s.trim_end_matches("△ Less").trim().to_string())
            .or_else(|| {
                item.select(&abstract_selector)
                    .next()
                    .map(element_text)
                    .map(|s| s.trim_start_matches("Abstract:").trim().to_string())
            })
            .unwrap_or_default();

        let year = item
            .select(&date_selector)
            .map(element_text)
            .find(|t| t.contains("Submitted"))
            .and_then(|t| {
                let submitted = t.split("Submitted").nth(1).unwrap_or("").to_string();
                extract_year(&year_regex, &submitted)
            });

        let categories: BTreeSet<String> = item
            .select(&category_selector)
            .map(element_text)
            .filter(|c| !c.is_empty())
            .collect();

        records.push(PaperRecord {
            title,
            authors,
            abstract_or_summary: summary,
            year,
            venue_or_source: VENUE.to_string(),
            url: format!("https://arxiv.org/abs/{}", arxiv_id),
            pdf_url: Some(format!("https://arxiv.org/pdf/{}", arxiv_id)),
            citation_count: 0,
            categories,
            source_provider_name: ARXIV.to_string(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const SAMPLE_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <entry>
    <id>http://arxiv.org/abs/2401.00001v2</id>
    <published>2024-01-02T10:00:00Z</published>
    <title>Question-Aware
      Chunking for RAG</title>
    <summary>We study how to chunk
      documents for retrieval.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2401.00001v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.00001v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.IR" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v1</id>
    <published>2024-01-03T10:00:00Z</published>
    <title>   </title>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00003v1</id>
    <published>2023-12-30T10:00:00Z</published>
    <title>Dense Retrieval Revisited</title>
    <summary>Another abstract.</summary>
    <author><name>Grace Hopper</name></author>
  </entry>
</feed>"#;

    const SAMPLE_LISTING: &str = r##"<html><body><ol>
  <li class="arxiv-result">
    <div class="is-marginless">
      <p class="list-title is-inline-block"><a href="https://arxiv.org/abs/2402.01234v3">arXiv:2402.01234</a></p>
      <div class="tags is-inline-block">
        <span class="tag is-small is-link tooltip is-tooltip-top" data-tooltip="Computation and Language">cs.CL</span>
      </div>
    </div>
    <p class="title is-5 mathjax">  Chunking Questions
       for Retrieval </p>
    <p class="authors"><span>Authors:</span> <a href="#">Ada Lovelace</a>, <a href="#">Alan Turing</a></p>
    <p class="abstract mathjax"><span class="abstract-full">Full abstract text. △ Less</span></p>
    <p class="is-size-7"><span>Submitted</span> 5 February, 2024; originally announced February 2024.</p>
  </li>
  <li class="arxiv-result">
    <p class="title is-5 mathjax">No link or authors</p>
  </li>
</ol></body></html>"##;

    fn adapter(server_url: &str, fallback: bool) -> ArxivAdapter {
        ArxivAdapter::new(ArxivConfig {
            base_url: server_url.to_string(),
            listing_url: server_url.to_string(),
            listing_fallback: fallback,
            ..Default::default()
        })
        .expect("adapter")
    }

    #[test]
    fn test_parse_atom_feed() {
        let records = parse_atom_feed(SAMPLE_ATOM).expect("parse");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "Question-Aware Chunking for RAG");
        assert_eq!(first.abstract_or_summary, "We study how to chunk documents for retrieval.");
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.year, Some(2024));
        assert_eq!(first.url, "http://arxiv.org/abs/2401.00001v2");
        assert_eq!(first.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2401.00001v2"));
        assert_eq!(first.citation_count, 0);
        assert_eq!(first.venue_or_source, "arXiv");
        assert!(first.categories.contains("cs.CL") && first.categories.contains("cs.IR"));

        let second = &records[1];
        assert_eq!(second.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2401.00003v1"));
        assert_eq!(second.url, "http://arxiv.org/abs/2401.00003v1");
    }

    #[test]
    fn test_parse_atom_feed_rejects_garbage() {
        assert!(parse_atom_feed("<feed><entry><title>x</wrong></feed>").is_err());
        assert!(parse_atom_feed("<feed></feed>").expect("empty").is_empty());
    }

    #[test]
    fn test_parse_listing() {
        let records = parse_listing(SAMPLE_LISTING).expect("parse");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title, "Chunking Questions for Retrieval");
        assert_eq!(r.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(r.abstract_or_summary, "Full abstract text.");
        assert_eq!(r.year, Some(2024));
        assert_eq!(r.url, "https://arxiv.org/abs/2402.01234");
        assert_eq!(r.pdf_url.as_deref(), Some("https://arxiv.org/pdf/2402.01234"));
        assert!(r.categories.contains("cs.CL"));
    }

    #[test]
    fn test_parse_listing_keeps_old_style_archive_prefix() {
        let html = r##"<html><body><ol>
  <li class="arxiv-result">
    <p class="list-title is-inline-block"><a href="https://arxiv.org/abs/hep-th/9901001v1">arXiv:hep-th/9901001</a></p>
    <p class="title is-5 mathjax">Strings Revisited</p>
    <p class="authors"><span>Authors:</span> <a href="#">Edward Witten</a></p>
    <p class="is-size-7"><span>Submitted</span> 4 January, 1999; originally announced January 1999.</p>
  </li>
</ol></body></html>"##;

        let records = parse_listing(html).expect("parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://arxiv.org/abs/hep-th/9901001");
        assert_eq!(records[0].pdf_url.as_deref(), Some("https://arxiv.org/pdf/hep-th/9901001"));
        assert_eq!(listing_id("https://arxiv.org/abs/2402.01234v3"), "2402.01234v3");
    }

    #[test]
    fn test_build_query_url_with_years() {
        let adapter = adapter("https://export.arxiv.org", false);
        let options = SearchOptions::new(3).with_years(Some(2020), None);
        let url = adapter.build_query_url("all:\"rag\"", &options).expect("url");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs.get("search_query").map(String::as_str),
            Some("(all:\"rag\") AND submittedDate:[202001010000 TO 999912312359]")
        );
        assert_eq!(pairs.get("max_results").map(String::as_str), Some("3"));
        assert_eq!(pairs.get("sortBy").map(String::as_str), Some("submittedDate"));
        assert_eq!(pairs.get("sortOrder").map(String::as_str), Some("descending"));
    }

    #[test]
    fn test_plain_terms_and_strip_version() {
        assert_eq!(
            plain_terms(r#"(all:"rag" OR ti:chunking) AND cat:cs.CL"#),
            "rag chunking"
        );
        assert_eq!(strip_version("2402.01234v3"), "2402.01234");
        assert_eq!(strip_version("2402.01234"), "2402.01234");
        assert_eq!(strip_version("hep-th/9901001v1"), "hep-th/9901001");
    }

    #[test]
    fn test_sort_criterion_from_str() {
        assert_eq!("relevance".parse::<SortCriterion>().ok(), Some(SortCriterion::Relevance));
        assert!("bogus".parse::<SortCriterion>().is_err());
    }

    #[tokio::test]
    async fn test_search_uses_api() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:\"rag\"".into()),
                Matcher::UrlEncoded("max_results".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(SAMPLE_ATOM)
            .expect(1)
            .create_async()
            .await;

        let records = adapter(&server.url(), true)
            .search("all:\"rag\"", &SearchOptions::new(1))
            .await
            .expect("search");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_provider_name, "arxiv");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_falls_back_to_listing() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;
        let listing = server
            .mock("GET", "/search/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "rag".into()),
                Matcher::UrlEncoded("size".into(), "25".into()),
            ]))
            .with_status(200)
            .with_body(SAMPLE_LISTING)
            .create_async()
            .await;

        let records = adapter(&server.url(), true)
            .search("all:\"rag\"", &SearchOptions::new(3))
            .await
            .expect("search");
        assert_eq!(records.len(), 1);
        listing.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_error_without_fallback() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let err = adapter(&server.url(), false)
            .search("all:\"rag\"", &SearchOptions::new(3))
            .await
            .unwrap_err();
        assert!(matches!(err, PaperflowError::Provider { .. }));
    }
}
