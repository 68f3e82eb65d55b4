//! Search request, response and streaming event models.

use serde::{Deserialize, Serialize};

use super::{PaperRecord, SourceType};

/// Default number of results requested from each catalog
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Search query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query string
    pub query: String,

    /// Maximum number of results requested from each catalog
    pub max_results: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// The query with surrounding whitespace removed
    pub fn trimmed(&self) -> &str {
        self.query.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }
}

/// One catalog's answer to a [`SearchQuery`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub papers: Vec<PaperRecord>,
    pub source: SourceType,
    pub query: String,
    /// Total hits the catalog reported, if it reports one
    pub total_results: Option<usize>,
}

impl SearchResponse {
    pub fn new(papers: Vec<PaperRecord>, source: SourceType, query: impl Into<String>) -> Self {
        Self {
            papers,
            source,
            query: query.into(),
            total_results: None,
        }
    }

    pub fn total_results(mut self, total: usize) -> Self {
        self.total_results = Some(total);
        self
    }
}

/// Per-catalog progress within one search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Pending,
    Complete,
    Failed,
}

impl ProviderStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ProviderStatus::Pending)
    }
}

/// An event on the search stream
///
/// Serialized with a `type` tag: `paper` events inline the record fields,
/// `complete` marks one catalog as settled and `done` closes the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchEvent {
    Paper(PaperRecord),
    #[serde(rename = "complete")]
    ProviderDone {
        source: SourceType,
        status: ProviderStatus,
    },
    Done {
        total: usize,
    },
}

impl SearchEvent {
    /// Render as one server-sent-events frame (`data: <json>\n\n`)
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchEvent::Done { .. })
    }
}

/// A title suggestion for type-ahead search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(alias = "id")]
    pub paper_id: String,
    pub title: String,
    /// Short "Author et al., 2020" style label, when the catalog provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors_year: Option<String>,
}
