//! Paper catalogs behind a common trait.
//!
//! Each catalog adapter translates one external search API into
//! [`PaperRecord`](crate::models::PaperRecord)s. Adapters hold no shared state
//! beyond their HTTP client, so the aggregator can fan out to them freely.
//!
//! # Feature Flags
//!
//! Individual catalogs can be disabled at compile time using Cargo features:
//!
//! - `semantic` - Semantic Scholar (default: enabled)
//! - `openalex` - OpenAlex (default: enabled)
//! - `crossref` - Crossref (default: enabled)

#[cfg(feature = "source-crossref")]
mod crossref;
#[cfg(feature = "source-openalex")]
mod openalex;
mod registry;
#[cfg(feature = "source-semantic")]
mod semantic;

pub mod mock;

#[cfg(feature = "source-crossref")]
pub use crossref::CrossRefSource;
pub use mock::MockSource;
#[cfg(feature = "source-openalex")]
pub use openalex::OpenAlexSource;
pub use registry::{SourceCapabilities, SourceRegistry};
#[cfg(feature = "source-semantic")]
pub use semantic::SemanticScholarSource;

use async_trait::async_trait;

use crate::models::{SearchQuery, SearchResponse, SourceType, Suggestion};

/// The interface every paper catalog implements.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `Source`
/// 2. Implement `id`, `name`, `source_type` and `search`
/// 3. Override `autocomplete` and `capabilities` if the catalog supports type-ahead
/// 4. Register it with a [`SourceRegistry`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "openalex")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Which catalog records from this source are tagged with
    fn source_type(&self) -> SourceType;

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    fn supports_autocomplete(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::AUTOCOMPLETE)
    }

    /// Search for papers matching the query
    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Title suggestions for a partially typed query
    async fn autocomplete(&self, _prefix: &str) -> Result<Vec<Suggestion>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    /// Non-success response from the catalog
    #[error("API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Map a non-success HTTP status to a [`SourceError`]
pub(crate) fn status_error(source: &str, status: reqwest::StatusCode) -> SourceError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        SourceError::RateLimit
    } else {
        SourceError::Api(format!("{} API returned status: {}", source, status))
    }
}

/// Keep at most `limit` non-blank labels
pub(crate) fn capped_labels<I>(labels: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    labels
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .take(limit)
        .collect()
}
