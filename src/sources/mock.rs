//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{PaperBuilder, PaperRecord, SearchQuery, SearchResponse, SourceType};
use crate::sources::{Source, SourceCapabilities, SourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Behavior {
    Succeed,
    Fail(String),
    Panic,
}

/// A source that returns canned papers, optionally after a delay or with a failure.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    source_type: SourceType,
    papers: Mutex<Vec<PaperRecord>>,
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a mock that impersonates `source_type` and returns no papers.
    pub fn new(source_type: SourceType) -> Self {
        Self {
            id: format!("mock-{}", source_type.id()),
            source_type,
            papers: Mutex::new(Vec::new()),
            behavior: Behavior::Succeed,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_papers(self, papers: Vec<PaperRecord>) -> Self {
        self.set_papers(papers);
        self
    }

    /// Fail every search with a network error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Fail(message.into());
        self
    }

    /// Panic inside `search`, simulating a crashed fetch task.
    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the canned papers.
    pub fn set_papers(&self, papers: Vec<PaperRecord>) {
        let mut guard = self.papers.lock().unwrap_or_else(|e| e.into_inner());
        *guard = papers;
    }

    /// Number of times `search` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail(message) => return Err(SourceError::Network(message.clone())),
            Behavior::Panic => panic!("mock source {} crashed", self.id),
        }

        let papers: Vec<PaperRecord> = {
            let guard = self.papers.lock().unwrap_or_else(|e| e.into_inner());
            guard.iter().take(query.max_results).cloned().collect()
        };
        Ok(SearchResponse::new(papers, self.source_type, &query.query))
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(id: &str, title: &str, source_type: SourceType) -> PaperRecord {
    PaperBuilder::new(id, title, source_type)
        .url(format!("http://example.com/{}", id))
        .build()
}
