//! Core data models for paper search and citation graphs.

mod graph;
mod paper;
mod search;

pub use graph::{
    EdgeKind, GraphDelta, GraphEdge, GraphFragment, GraphNode, GraphSnapshot, LayoutEvent,
    NodeRole,
};
pub use paper::{PaperBuilder, PaperRecord, SourceType};
pub use search::{
    ProviderStatus, SearchEvent, SearchQuery, SearchResponse, Suggestion, DEFAULT_MAX_RESULTS,
};
