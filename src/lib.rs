//! # Paper Mesh
//!
//! Search several literature catalogs at once and explore a paper's citation
//! neighborhood as a growing graph.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PaperRecord, SearchEvent, graph types)
//! - [`sources`]: Catalog adapters behind the [`Source`] trait
//! - [`utils`]: Deduplication, HTTP client, throttle retry and the streaming search aggregator
//! - [`mesh`]: Citation client, graph mapper and graph sessions
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal rendering for the CLI

pub mod config;
pub mod mesh;
pub mod models;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use mesh::{CitationClient, GraphSession, LookupId, MeshError};
pub use models::{PaperRecord, SearchEvent};
pub use sources::{Source, SourceRegistry};
pub use utils::{SearchAggregator, SearchStream};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
