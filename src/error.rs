//! Custom error types for paperflow.
//!
//! The first five variants mirror the pipeline's failure taxonomy; the rest
//! are transport-level errors that get folded into one of them at the
//! component boundary.

use thiserror::Error;

/// Main error type for paperflow operations.
#[derive(Debug, Error)]
pub enum PaperflowError {
    /// Missing credential or invalid setting, raised before any network call
    #[error("Config error: {0}")]
    Configuration(String),

    /// Completion service unusable or returned no query
    #[error("Query formulation failed: {0}")]
    Formulation(String),

    /// A single source adapter failed
    #[error("Provider '{source_name}' failed: {message}")]
    Provider {
        /// Name of the failing source
        source_name: String,
        /// Underlying cause
        message: String,
    },

    /// A single record could not be uploaded to the store
    #[error("Failed to ingest '{title}': {message}")]
    IngestionItem {
        /// Title of the record that failed
        title: String,
        /// Underlying cause
        message: String,
    },

    /// Store search unusable
    #[error("Search failed: {0}")]
    Search(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from API
        message: String,
    },
}

impl PaperflowError {
    /// Whether the pipeline degrades gracefully on this error instead of
    /// ending the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PaperflowError::Provider { .. } | PaperflowError::IngestionItem { .. }
        )
    }

    /// Wrap any error as a failure of the named source.
    pub fn provider(source_name: &str, err: impl std::fmt::Display) -> Self {
        PaperflowError::Provider {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }

    /// Shorthand for a missing credential.
    pub fn missing_credential(var: &str) -> Self {
        PaperflowError::Configuration(format!("{} is not set", var))
    }
}

/// Result type alias using `PaperflowError`
pub type Result<T> = std::result::Result<T, PaperflowError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| PaperflowError::Parse(msg.to_string()))
    }
}

/// Map a non-success HTTP status to the matching error variant.
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> PaperflowError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return PaperflowError::RateLimited(60);
    }
    PaperflowError::Api {
        code: status.as_u16(),
        message: format!("HTTP error: {} - {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        assert!(PaperflowError::provider("arxiv", "timeout").is_recoverable());
        assert!(PaperflowError::IngestionItem {
            title: "Paper X".into(),
            message: "boom".into(),
        }
        .is_recoverable());
        assert!(!PaperflowError::missing_credential("SERPAPI_API_KEY").is_recoverable());
        assert!(!PaperflowError::Formulation("empty".into()).is_recoverable());
        assert!(!PaperflowError::Search("down".into()).is_recoverable());
    }

    #[test]
    fn test_status_error_rate_limit() {
        let err = status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, PaperflowError::RateLimited(60)));
        let err = status_error(reqwest::StatusCode::BAD_GATEWAY, "upstream");
        assert!(matches!(err, PaperflowError::Api { code: 502, .. }));
    }

    #[test]
    fn test_ok_or_parse() {
        let none: Option<u8> = None;
        assert!(matches!(none.ok_or_parse("missing"), Err(PaperflowError::Parse(_))));
    }
}
