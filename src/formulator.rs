//! Natural-language request -> structured arXiv-style query.
//!
//! The completion service is told to expand the request (synonyms, acronyms,
//! categories); this module only enforces the output contract: one line,
//! query syntax only, never empty.

use crate::completion::CompletionService;
use crate::error::{PaperflowError, Result};
use crate::prompts::query_formulation::{build_user_prompt, SYSTEM_PROMPT};
use crate::query_grammar;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lead-ins some models put before the query
const EXPLANATION_PREFIXES: &[&str] = &[
    "here is the enhanced query:",
    "here is the query:",
    "here's the query:",
    "the enhanced query is:",
    "the query is:",
    "enhanced query:",
    "your output:",
    "query:",
];

/// Start of a trailing explanation after the query
const EXPLANATION_MARKERS: &[&str] = &[
    "this query",
    "the query",
    "this enhanced",
    "the enhanced",
    "this will",
    "this should",
];

/// Long field names occasionally produced instead of arXiv's short ones
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("title", "ti"),
    ("author", "au"),
    ("abstract", "abs"),
    ("category", "cat"),
];

/// Wraps a [`CompletionService`] and turns requests into formulated queries.
pub struct QueryFormulator {
    service: Arc<dyn CompletionService>,
}

impl QueryFormulator {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Formulate a structured query for `request`.
    ///
    /// # Errors
    ///
    /// `PaperflowError::Formulation` if the request is blank, the service is
    /// unreachable, or its output is empty or not a valid query.
    pub async fn formulate(&self, request: &str) -> Result<String> {
        let user_text = build_user_prompt(request);
        if user_text.is_empty() {
            return Err(PaperflowError::Formulation("request is empty".to_string()));
        }

        info!(request = %user_text, model = self.service.model_name(), "Formulating query");

        let raw = self
            .service
            .complete(SYSTEM_PROMPT, &user_text)
            .await
            .map_err(|e| {
                warn!(error = %e, "Completion service failed");
                PaperflowError::Formulation(format!("completion service unavailable: {}", e))
            })?;

        debug!(raw = %raw, "Completion output");

        let query = clean_query(&raw);
        if query.is_empty() {
            return Err(PaperflowError::Formulation(
                "completion service returned an empty query".to_string(),
            ));
        }

        query_grammar::validate(&query)?;

        info!(query = %query, "Query formulated");
        Ok(query)
    }
}

/// Reduce raw completion output to the bare query string.
pub fn clean_query(raw: &str) -> String {
    let mut text = strip_code_fence(raw.trim()).trim().to_string();

    let lower = text.to_lowercase();
    if let Some(prefix) = EXPLANATION_PREFIXES.iter().find(|p| lower.starts_with(*p)) {
        text = text[prefix.len()..].trim().to_string();
    }

    let text = text.trim_matches('`');
    let text = cut_trailing_explanation(text);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return collapsed;
    }

    let normalized = normalize_syntax(&collapsed);
    if query_grammar::has_field_prefix(&normalized) {
        normalized
    } else {
        format!("all:\"{}\"", normalized.replace('"', ""))
    }
}

/// Remove a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let body = match text.find('\n') {
        Some(idx) => &text[idx + 1..],
        None => text.trim_start_matches('`'),
    };
    body.trim_end().trim_end_matches("```")
}

/// Cut at the first explanation marker that starts a word outside quotes.
fn cut_trailing_explanation(text: &str) -> &str {
    let lower = text.to_lowercase();
    let mut in_quotes = false;
    let mut prev_is_space = false;

    for (idx, c) in text.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if !in_quotes
            && idx > 0
            && prev_is_space
            && EXPLANATION_MARKERS
                .iter()
                .any(|m| lower.get(idx..).is_some_and(|rest| rest.starts_with(m)))
        {
            return text[..idx].trim_end();
        }
        prev_is_space = c.is_whitespace();
    }
    text
}

/// Uppercase connectors and shorten field names, leaving quoted phrases alone.
fn normalize_syntax(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut word = String::new();
    let mut in_quotes = false;

    for c in query.chars() {
        if in_quotes {
            out.push(c);
            if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        if c == ':' {
            out.push_str(&field_name(&word));
            word.clear();
            out.push(c);
            continue;
        }
        if c.is_whitespace() || matches!(c, '(' | ')' | '"') {
            out.push_str(&connector(&word));
            word.clear();
            out.push(c);
            if c == '"' {
                in_quotes = true;
            }
            continue;
        }
        word.push(c);
    }
    out.push_str(&connector(&word));
    out
}

fn field_name(word: &str) -> String {
    let lower = word.to_lowercase();
    FIELD_ALIASES
        .iter()
        .find(|(long, _)| *long == lower)
        .map(|(_, short)| short.to_string())
        .unwrap_or(lower)
}

fn connector(word: &str) -> String {
    let upper = word.to_uppercase();
    if query_grammar::CONNECTORS.contains(&upper.as_str()) {
        upper
    } else {
        word.to_string()
    }
}
