//! Rate-limited client for the citation graph API.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use super::{LookupId, MeshError, RATE_LIMIT_HINT};
use crate::config::{CitationConfig, Config};
use crate::utils::{with_throttle_retry, AttemptError, HttpClient, RetryError, ThrottlePolicy};

/// Fields requested for every paper in a neighborhood
pub const GRAPH_FIELDS: &str = "paperId,title,authors,year,citationCount,externalIds,url";

/// The three raw responses that describe one paper's neighborhood
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawNeighborhood {
    pub center: Value,
    pub references: Value,
    pub citations: Value,
}

/// Source of raw neighborhoods for a [`GraphSession`](super::GraphSession)
#[async_trait]
pub trait NeighborhoodFetcher: Send + Sync + std::fmt::Debug {
    async fn fetch_neighborhood(&self, lookup: &LookupId) -> Result<RawNeighborhood, MeshError>;
}

/// Semantic Scholar Graph API client
///
/// Each request is retried on HTTP 429 with a linearly growing wait; any other
/// failure is returned immediately.
#[derive(Debug, Clone)]
pub struct CitationClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    policy: ThrottlePolicy,
    pause: Duration,
    reference_limit: usize,
    citation_limit: usize,
}

impl CitationClient {
    pub fn new(http: HttpClient, citation: &CitationConfig, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: citation.base_url.trim_end_matches('/').to_string(),
            api_key,
            policy: citation.throttle_policy(),
            pause: citation.inter_request_pause(),
            reference_limit: citation.reference_limit,
            citation_limit: citation.citation_limit,
        }
    }

    pub fn from_config(http: HttpClient, config: &Config) -> Self {
        Self::new(http, &config.citation, config.api_keys.semantic_scholar.clone())
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    pub fn detail_endpoint(&self, lookup: &LookupId) -> String {
        format!(
            "/paper/{}?fields={}",
            urlencoding::encode(lookup.as_str()),
            GRAPH_FIELDS
        )
    }

    pub fn references_endpoint(&self, lookup: &LookupId) -> String {
        format!(
            "/paper/{}/references?fields={}&limit={}",
            urlencoding::encode(lookup.as_str()),
            GRAPH_FIELDS,
            self.reference_limit
        )
    }

    pub fn citations_endpoint(&self, lookup: &LookupId) -> String {
        format!(
            "/paper/{}/citations?fields={}&limit={}",
            urlencoding::encode(lookup.as_str()),
            GRAPH_FIELDS,
            self.citation_limit
        )
    }

    fn request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .client()
            .get(format!("{}{}", self.base_url, endpoint));
        match self.api_key {
            Some(ref key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    /// GET one endpoint and return its JSON body
    pub async fn fetch_endpoint(&self, endpoint: &str) -> Result<Value, MeshError> {
        let result = with_throttle_retry(self.policy, |attempt| {
            let request = self.request(endpoint);
            let endpoint = endpoint.to_string();
            async move {
                debug!(%endpoint, attempt, "Citation API request");
                let response = request.send().await.map_err(|e| {
                    AttemptError::Fatal(MeshError::Network(format!(
                        "Failed to reach citation API: {}",
                        e
                    )))
                })?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(AttemptError::Throttled);
                }
                if !status.is_success() {
                    return Err(AttemptError::Fatal(MeshError::ProviderError {
                        status: status.as_u16(),
                        endpoint,
                    }));
                }

                response.json::<Value>().await.map_err(|e| {
                    AttemptError::Fatal(MeshError::Parse(format!("Failed to parse JSON: {}", e)))
                })
            }
        })
        .await;

        result.map_err(|e| match e {
            RetryError::Exhausted { attempts } => MeshError::RateLimitExceeded {
                attempts,
                hint: RATE_LIMIT_HINT.to_string(),
            },
            RetryError::Fatal(e) => e,
        })
    }

    /// Fetch detail, references and citations, strictly one after another
    pub async fn fetch_neighborhood(
        &self,
        lookup: &LookupId,
    ) -> Result<RawNeighborhood, MeshError> {
        info!(lookup = %lookup, "Fetching citation neighborhood");

        let center = self.fetch_endpoint(&self.detail_endpoint(lookup)).await?;
        sleep(self.pause).await;
        let references = self.fetch_endpoint(&self.references_endpoint(lookup)).await?;
        sleep(self.pause).await;
        let citations = self.fetch_endpoint(&self.citations_endpoint(lookup)).await?;

        Ok(RawNeighborhood {
            center,
            references,
            citations,
        })
    }
}

#[async_trait]
impl NeighborhoodFetcher for CitationClient {
    async fn fetch_neighborhood(&self, lookup: &LookupId) -> Result<RawNeighborhood, MeshError> {
        CitationClient::fetch_neighborhood(self, lookup).await
    }
}
