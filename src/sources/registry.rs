//! Registry of the catalogs a search fans out to.

use std::sync::Arc;

use super::Source;
use crate::config::Config;
use crate::models::SourceType;
use crate::utils::HttpClient;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const AUTOCOMPLETE = 1 << 1;
        const CITATION_GRAPH = 1 << 2;
    }
}

/// Ordered set of registered sources, keyed by [`Source::id`]
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register every catalog compiled into this build
    #[allow(unused_variables)]
    pub fn from_config(config: &Config, http: &HttpClient) -> Self {
        let mut registry = Self::empty();

        #[cfg(feature = "source-semantic")]
        registry.register(Arc::new(super::SemanticScholarSource::from_config(
            http.clone(),
            config,
        )));
        #[cfg(feature = "source-openalex")]
        registry.register(Arc::new(super::OpenAlexSource::from_config(
            http.clone(),
            config,
        )));
        #[cfg(feature = "source-crossref")]
        registry.register(Arc::new(super::CrossRefSource::from_config(
            http.clone(),
            config,
        )));

        registry
    }

    /// Build a registry from explicit sources, in order
    pub fn from_sources<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Source>>,
    {
        let mut registry = Self::empty();
        for source in sources {
            registry.register(source);
        }
        registry
    }

    /// Register a source, replacing any source with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(idx) => self.sources[idx] = source,
            None => self.sources.push(source),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    pub fn by_type(&self, source_type: SourceType) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.source_type() == source_type)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    pub fn searchable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::SEARCH)
    }

    /// Keep only the given catalogs; an empty selection keeps everything
    pub fn select(&self, types: &[SourceType]) -> Self {
        if types.is_empty() {
            return self.clone();
        }
        Self {
            sources: self
                .sources
                .iter()
                .filter(|s| types.contains(&s.source_type()))
                .cloned()
                .collect(),
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
