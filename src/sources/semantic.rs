//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use serde::Deserialize;

use super::status_error;
use crate::config::Config;
use crate::models::{PaperBuilder, PaperRecord, SearchQuery, SearchResponse, SourceType, Suggestion};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const SEARCH_FIELDS: &str =
    "paperId,title,authors,abstract,year,citationCount,externalIds,url,venue,fieldsOfStudy";

/// Suggestions returned for one autocomplete call
const MAX_SUGGESTIONS: usize = 8;

/// Shortest prefix worth sending to the autocomplete endpoint
const MIN_AUTOCOMPLETE_CHARS: usize = 2;

/// Semantic Scholar research source
///
/// Uses the Graph API `paper/search` and `paper/autocomplete` endpoints.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(client: HttpClient, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(client: HttpClient, config: &Config) -> Self {
        Self::new(
            client,
            &config.sources.semantic_scholar_url,
            config.api_keys.semantic_scholar.clone(),
        )
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Add API key to request headers if available
    fn add_api_key_if_present(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.api_key {
            builder.header("x-api-key", key)
        } else {
            builder
        }
    }

    /// Map one search hit; hits without an id or title are dropped
    fn parse_paper(data: S2Paper) -> Option<PaperRecord> {
        let paper_id = data.paper_id.filter(|id| !id.is_empty())?;
        let title = data.title.filter(|t| !t.trim().is_empty())?;

        let url = data
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{}", paper_id));

        Some(
            PaperBuilder::new(paper_id, title, SourceType::SemanticScholar)
                .authors(data.authors.into_iter().filter_map(|a| a.name))
                .abstract_text(data.r#abstract.unwrap_or_default())
                .maybe_doi(data.external_ids.and_then(|ids| ids.doi))
                .year(data.year.unwrap_or(0))
                .citation_count(data.citation_count.unwrap_or(0))
                .url(url)
                .venue(data.venue.unwrap_or_default())
                .fields_of_study(data.fields_of_study.unwrap_or_default())
                .build(),
        )
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn source_type(&self) -> SourceType {
        SourceType::SemanticScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::AUTOCOMPLETE
            | SourceCapabilities::CITATION_GRAPH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let url = format!(
            "/paper/search?query={}&limit={}&fields={}",
            urlencoding::encode(query.trimmed()),
            query.max_results,
            SEARCH_FIELDS
        );

        let response = self
            .add_api_key_if_present(self.client.client().get(self.build_url(&url)))
            .send()
            .await
            .map_err(|e| {
                SourceError::Network(format!("Failed to search Semantic Scholar: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(status_error("Semantic Scholar", response.status()));
        }

        let data: S2SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let papers: Vec<PaperRecord> =
            data.data.into_iter().filter_map(Self::parse_paper).collect();
        let mut response =
            SearchResponse::new(papers, SourceType::SemanticScholar, query.trimmed());
        response.total_results = data.total;
        Ok(response)
    }

    async fn autocomplete(&self, prefix: &str) -> Result<Vec<Suggestion>, SourceError> {
        let prefix = prefix.trim();
        if prefix.chars().count() < MIN_AUTOCOMPLETE_CHARS {
            return Ok(Vec::new());
        }

        let url = format!("/paper/autocomplete?query={}", urlencoding::encode(prefix));
        let response = self
            .add_api_key_if_present(self.client.client().get(self.build_url(&url)))
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to fetch suggestions: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("Semantic Scholar", response.status()));
        }

        let data: S2AutocompleteResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(data.matches.into_iter().take(MAX_SUGGESTIONS).collect())
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    total: Option<usize>,
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    r#abstract: Option<String>,
    year: Option<u32>,
    citation_count: Option<u32>,
    external_ids: Option<S2ExternalIds>,
    url: Option<String>,
    venue: Option<String>,
    fields_of_study: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2AutocompleteResponse {
    #[serde(default)]
    matches: Vec<Suggestion>,
}
