//! Citation mesh: a paper's references and citers as an incrementally
//! expandable graph.
//!
//! - [`CitationClient`] talks to the Semantic Scholar Graph API under its rate
//!   limits: throttled calls back off and retry, and the three calls behind
//!   one neighborhood are issued one after another with a pause in between.
//! - [`map_to_graph`] turns the three raw responses into nodes and edges.
//! - [`GraphSession`] owns one growing graph and expands one node at a time.

mod client;
mod mapper;
pub mod mock;
mod session;

pub use client::{CitationClient, NeighborhoodFetcher, RawNeighborhood, GRAPH_FIELDS};
pub use mapper::{map_to_graph, UNKNOWN_TITLE};
pub use session::{ExpandOutcome, GraphSession, NodeState, RejectReason};

use serde::{Deserialize, Serialize};

use crate::models::{PaperRecord, SourceType};
use crate::utils::normalize_doi;

/// Shown to users when the citation API keeps throttling us
pub const RATE_LIMIT_HINT: &str =
    "Semantic Scholar is rate-limiting requests. Please wait a few seconds and try again.";

/// Errors from fetching or mapping a citation neighborhood
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// Still throttled after every retry; recoverable by trying again later
    #[error("Too many requests after {attempts} attempts. {hint}")]
    RateLimitExceeded { attempts: u32, hint: String },

    /// Non-throttling HTTP failure; not retried
    #[error("Semantic Scholar API {status}: {endpoint}")]
    ProviderError { status: u16, endpoint: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MeshError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MeshError::RateLimitExceeded { .. })
    }
}

/// Key for the citation API: a native paper id or a `DOI:<doi>` lookup string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupId(String);

impl LookupId {
    pub fn from_paper_id(id: &str) -> Result<Self, MeshError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(MeshError::InvalidRequest("paperId or doi required".to_string()));
        }
        Ok(Self(id.to_string()))
    }

    pub fn from_doi(doi: &str) -> Result<Self, MeshError> {
        let doi = normalize_doi(doi);
        if doi.is_empty() {
            return Err(MeshError::InvalidRequest("paperId or doi required".to_string()));
        }
        Ok(Self(format!("DOI:{}", doi)))
    }

    /// Lookup for a search hit: native id for Semantic Scholar, else its DOI
    pub fn for_record(record: &PaperRecord) -> Option<Self> {
        match record.source {
            SourceType::SemanticScholar => Self::from_paper_id(&record.id).ok(),
            _ => record.doi.as_deref().and_then(|doi| Self::from_doi(doi).ok()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_doi(&self) -> bool {
        self.0.starts_with("DOI:")
    }
}

impl std::fmt::Display for LookupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
