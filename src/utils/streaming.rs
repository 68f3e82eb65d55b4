//! Streaming multi-source search.
//!
//! [`SearchAggregator::search`] fans a query out to every searchable source
//! at once and returns a [`SearchStream`] of [`SearchEvent`]s. Papers are
//! deduplicated across sources as they arrive, each source reports exactly
//! one `ProviderDone`, and a single `Done` closes the stream.

use futures_util::future::join_all;
use futures_util::stream::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::dedup::{DedupIndex, DedupVerdict, DEFAULT_TITLE_DISTANCE};
use crate::config::Config;
use crate::models::{PaperRecord, ProviderStatus, SearchEvent, SearchQuery, SourceType};
use crate::sources::{Source, SourceRegistry};

/// Buffered events between the fetch tasks and the consumer
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid query: search text must not be empty")]
    InvalidQuery,
}

/// State of one search: what has been emitted and which sources settled
#[derive(Debug)]
pub struct SearchSession {
    query: String,
    accepted: Vec<PaperRecord>,
    index: DedupIndex,
    provider_status: HashMap<SourceType, ProviderStatus>,
}

impl SearchSession {
    fn new(query: &str, threshold: usize, providers: &[SourceType]) -> Self {
        Self {
            query: query.to_string(),
            accepted: Vec::new(),
            index: DedupIndex::new(threshold),
            provider_status: providers
                .iter()
                .map(|p| (*p, ProviderStatus::Pending))
                .collect(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Records emitted so far, in emission order
    pub fn accepted(&self) -> &[PaperRecord] {
        &self.accepted
    }

    pub fn status(&self, provider: SourceType) -> Option<ProviderStatus> {
        self.provider_status.get(&provider).copied()
    }

    /// Check `candidate` against everything accepted so far and append it when new
    fn offer(&mut self, candidate: &PaperRecord) -> DedupVerdict {
        let verdict = self.index.admit(candidate);
        if verdict.is_accept() {
            self.accepted.push(candidate.clone());
        }
        verdict
    }

    fn settle(&mut self, provider: SourceType, status: ProviderStatus) {
        self.provider_status.insert(provider, status);
    }

    fn is_settled(&self, provider: SourceType) -> bool {
        self.status(provider).is_some_and(|s| s.is_settled())
    }
}

/// Fans one query out to many sources and merges their answers
#[derive(Debug, Clone)]
pub struct SearchAggregator {
    registry: SourceRegistry,
    title_distance: usize,
    channel_capacity: usize,
}

impl SearchAggregator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            title_distance: DEFAULT_TITLE_DISTANCE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn from_config(registry: SourceRegistry, config: &Config) -> Self {
        Self::new(registry).with_title_distance(config.dedup.title_distance_threshold)
    }

    pub fn with_title_distance(mut self, threshold: usize) -> Self {
        self.title_distance = threshold;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Start a search; fails only when the query is blank
    ///
    /// Must be called within a Tokio runtime. Dropping the returned stream
    /// stops delivery; in-flight fetches run to completion and their results
    /// are discarded.
    pub fn search(&self, query: SearchQuery) -> Result<SearchStream, SearchError> {
        if query.is_blank() {
            return Err(SearchError::InvalidQuery);
        }
        let query = SearchQuery {
            query: query.trimmed().to_string(),
            ..query
        };

        let sources: Vec<Arc<dyn Source>> =
            self.registry.searchable().into_iter().cloned().collect();
        let providers: Vec<SourceType> = sources.iter().map(|s| s.source_type()).collect();
        info!(query = %query.query, providers = sources.len(), "Starting search");

        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let session = Arc::new(Mutex::new(SearchSession::new(
            &query.query,
            self.title_distance,
            &providers,
        )));
        let query = Arc::new(query);

        let handles: Vec<_> = sources
            .into_iter()
            .map(|source| {
                let provider = source.source_type();
                let task = tokio::spawn(fetch_provider(
                    source,
                    query.clone(),
                    session.clone(),
                    sender.clone(),
                ));
                (provider, task)
            })
            .collect();

        tokio::spawn(async move {
            let (providers, tasks): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
            let results = join_all(tasks).await;

            let mut session = session.lock().await;
            for (provider, result) in providers.into_iter().zip(results) {
                if let Err(e) = result {
                    warn!(provider = provider.id(), "Fetch task aborted: {}", e);
                }
                // A task that died before reporting never emitted its ProviderDone.
                if !session.is_settled(provider) {
                    session.settle(provider, ProviderStatus::Failed);
                    let _ = sender
                        .send(SearchEvent::ProviderDone {
                            source: provider,
                            status: ProviderStatus::Failed,
                        })
                        .await;
                }
            }

            let total = session.accepted().len();
            info!(query = %session.query(), total, "Search complete");
            let _ = sender.send(SearchEvent::Done { total }).await;
        });

        Ok(SearchStream { receiver })
    }
}

/// Run one source and push its papers through the shared session
async fn fetch_provider(
    source: Arc<dyn Source>,
    query: Arc<SearchQuery>,
    session: Arc<Mutex<SearchSession>>,
    sender: mpsc::Sender<SearchEvent>,
) {
    let provider = source.source_type();

    let status = match source.search(&query).await {
        Ok(response) => {
            debug!(provider = provider.id(), count = response.papers.len(), "Provider returned");
            for paper in response.papers {
                // Check, append and emit under one lock so emission order is accepted order.
                let mut session = session.lock().await;
                match session.offer(&paper) {
                    DedupVerdict::Accept => {
                        if sender.send(SearchEvent::Paper(paper)).await.is_err() {
                            debug!(provider = provider.id(), "Search stream closed by consumer");
                        }
                    }
                    verdict => {
                        debug!(
                            provider = provider.id(),
                            id = %paper.id,
                            ?verdict,
                            "Dropped duplicate"
                        );
                    }
                }
            }
            ProviderStatus::Complete
        }
        Err(e) => {
            warn!(provider = provider.id(), "Provider failed: {}", e);
            ProviderStatus::Failed
        }
    };

    let mut session = session.lock().await;
    session.settle(provider, status);
    let _ = sender
        .send(SearchEvent::ProviderDone {
            source: provider,
            status,
        })
        .await;
}

/// Everything a finished search produced
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    pub papers: Vec<PaperRecord>,
    /// Settled sources, in the order they reported
    pub providers: Vec<(SourceType, ProviderStatus)>,
    /// Count carried by the `Done` event, if it arrived
    pub total: Option<usize>,
}

/// Receiving side of a running search
#[derive(Debug)]
pub struct SearchStream {
    receiver: mpsc::Receiver<SearchEvent>,
}

impl SearchStream {
    /// Next event, or `None` once the stream is closed
    pub async fn next_event(&mut self) -> Option<SearchEvent> {
        self.receiver.recv().await
    }

    /// Drain the stream into a list of events
    pub async fn collect_events(mut self) -> Vec<SearchEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Drain the stream into a [`SearchSummary`]
    pub async fn collect_summary(self) -> SearchSummary {
        let mut summary = SearchSummary::default();
        for event in self.collect_events().await {
            match event {
                SearchEvent::Paper(paper) => summary.papers.push(paper),
                SearchEvent::ProviderDone { source, status } => {
                    summary.providers.push((source, status))
                }
                SearchEvent::Done { total } => summary.total = Some(total),
            }
        }
        summary
    }
}

impl Stream for SearchStream {
    type Item = SearchEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
