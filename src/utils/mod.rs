//! Utility modules supporting search and citation crawling.
//!
//! - [`DedupIndex`] / [`accept`]: cross-catalog duplicate detection by DOI and title distance
//! - [`deduplicate_papers`] / [`find_duplicates`]: the same rules applied to a whole list
//! - [`HttpClient`]: shared HTTP client with timeouts
//! - [`with_throttle_retry`]: retry loop for "too many requests" responses
//! - [`SearchAggregator`]: concurrent multi-source search with a streaming result feed
//!
//! # Deduplication
//!
//! ```rust
//! use paper_mesh::models::{PaperBuilder, SourceType};
//! use paper_mesh::utils::deduplicate_papers;
//!
//! let papers = vec![
//!     PaperBuilder::new("W1", "Graph Neural Networks", SourceType::OpenAlex).build(),
//!     PaperBuilder::new("10.1/x", "graph neural networks!", SourceType::CrossRef).build(),
//! ];
//! let unique = deduplicate_papers(papers);
//! assert_eq!(unique.len(), 1);
//! ```

mod dedup;
mod http;
mod retry;
mod streaming;

pub use dedup::{
    accept, accept_with_threshold, deduplicate_papers, deduplicate_papers_with_threshold,
    find_duplicates, find_duplicates_with_threshold, normalize_doi, normalize_title, DedupIndex,
    DedupVerdict, DEFAULT_TITLE_DISTANCE,
};
pub use http::{HttpClient, USER_AGENT};
pub use retry::{with_throttle_retry, AttemptError, RetryError, ThrottlePolicy};
pub use streaming::{
    SearchAggregator, SearchError, SearchSession, SearchStream, SearchSummary,
};
