//! In-memory neighborhood fetcher for testing graph sessions.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{LookupId, MeshError, NeighborhoodFetcher, RawNeighborhood};

/// Serves canned neighborhoods keyed by lookup id.
///
/// A gate can hold every fetch until [`MockFetcher::release`] is called,
/// which lets tests observe a session while an expansion is in flight.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Result<RawNeighborhood, MeshError>>>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every fetch until released
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Serve a neighborhood whose center is `id`
    pub fn with_neighborhood(self, id: &str, references: &[&str], citations: &[&str]) -> Self {
        self.set_response(id, Ok(neighborhood(id, references, citations)));
        self
    }

    pub fn with_error(self, id: &str, error: MeshError) -> Self {
        self.set_response(id, Err(error));
        self
    }

    pub fn set_response(&self, id: &str, response: Result<RawNeighborhood, MeshError>) {
        let mut guard = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(id.to_string(), response);
    }

    /// Let one waiting fetch proceed
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NeighborhoodFetcher for MockFetcher {
    async fn fetch_neighborhood(&self, lookup: &LookupId) -> Result<RawNeighborhood, MeshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let guard = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .get(lookup.as_str())
            .cloned()
            .unwrap_or_else(|| {
                Err(MeshError::ProviderError {
                    status: 404,
                    endpoint: format!("/paper/{}", lookup),
                })
            })
    }
}

fn paper(id: &str) -> Value {
    json!({
        "paperId": id,
        "title": format!("Paper {id}"),
        "authors": [{"name": "Test Author"}],
        "year": 2020,
        "citationCount": 1
    })
}

/// Raw responses shaped like the citation API for a small neighborhood
pub fn neighborhood(center: &str, references: &[&str], citations: &[&str]) -> RawNeighborhood {
    RawNeighborhood {
        center: paper(center),
        references: json!({
            "data": references
                .iter()
                .map(|id| json!({"citedPaper": paper(id)}))
                .collect::<Vec<_>>()
        }),
        citations: json!({
            "data": citations
                .iter()
                .map(|id| json!({"citingPaper": paper(id)}))
                .collect::<Vec<_>>()
        }),
    }
}
