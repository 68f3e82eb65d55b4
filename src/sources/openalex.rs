//! OpenAlex research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::{capped_labels, status_error};
use crate::config::Config;
use crate::models::{PaperBuilder, PaperRecord, SearchQuery, SearchResponse, SourceType};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Reconstructed abstracts are cut to this many characters
const ABSTRACT_MAX_CHARS: usize = 500;

const MAX_TOPICS: usize = 5;

const DOI_RESOLVER: &str = "https://doi.org/";

/// OpenAlex research source
///
/// Uses the OpenAlex REST API.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: HttpClient,
    base_url: String,
    email: Option<String>,
}

impl OpenAlexSource {
    pub fn new(client: HttpClient, base_url: impl Into<String>, email: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email,
        }
    }

    pub fn from_config(client: HttpClient, config: &Config) -> Self {
        Self::new(
            client,
            &config.sources.openalex_url,
            config.sources.mailto.clone(),
        )
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Add email to request URL if available (for polite pool)
    fn add_email_if_present(&self, url: &str) -> String {
        if let Some(ref email) = self.email {
            format!("{}&mailto={}", url, urlencoding::encode(email))
        } else {
            url.to_string()
        }
    }

    fn parse_paper(data: OAWork) -> Option<PaperRecord> {
        let id = data.id.filter(|id| !id.is_empty())?;
        let title = data
            .display_name
            .or(data.title)
            .filter(|t| !t.trim().is_empty())?;

        let doi = data
            .doi
            .map(|d| d.strip_prefix(DOI_RESOLVER).map(str::to_string).unwrap_or(d));

        let url = data
            .primary_location
            .and_then(|l| l.landing_page_url)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| id.clone());

        let venue = data
            .host_venue
            .and_then(|v| v.display_name)
            .unwrap_or_default();

        Some(
            PaperBuilder::new(id, title, SourceType::OpenAlex)
                .authors(
                    data.authorships
                        .into_iter()
                        .filter_map(|a| a.author.display_name),
                )
                .abstract_text(reconstruct_abstract(data.abstract_inverted_index.as_ref()))
                .maybe_doi(doi)
                .year(data.publication_year.unwrap_or(0))
                .citation_count(data.cited_by_count.unwrap_or(0))
                .url(url)
                .venue(venue)
                .fields_of_study(capped_labels(
                    data.topics.into_iter().filter_map(|t| t.display_name),
                    MAX_TOPICS,
                ))
                .build(),
        )
    }
}

/// Rebuild plain text from an inverted index (`word -> [positions]`)
///
/// Words are ordered by position, joined with single spaces and cut to
/// 500 characters.
pub fn reconstruct_abstract(index: Option<&HashMap<String, Vec<usize>>>) -> String {
    let Some(index) = index else {
        return String::new();
    };

    let mut words: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    words.sort_by_key(|&(position, _)| position);

    let text = words
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ");
    text.chars().take(ABSTRACT_MAX_CHARS).collect()
}

#[async_trait]
impl Source for OpenAlexSource {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn source_type(&self) -> SourceType {
        SourceType::OpenAlex
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let url = format!(
            "/works?search={}&per_page={}",
            urlencoding::encode(query.trimmed()),
            query.max_results
        );
        let url = self.add_email_if_present(&url);

        let response = self
            .client
            .client()
            .get(self.build_url(&url))
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search OpenAlex: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("OpenAlex", response.status()));
        }

        let data: WorksResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let papers: Vec<PaperRecord> = data
            .results
            .into_iter()
            .filter_map(Self::parse_paper)
            .collect();
        let mut response = SearchResponse::new(papers, SourceType::OpenAlex, query.trimmed());
        response.total_results = data.meta.map(|m| m.count);
        Ok(response)
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<OAWork>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    id: Option<String>,
    display_name: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    publication_year: Option<u32>,
    cited_by_count: Option<u32>,
    doi: Option<String>,
    primary_location: Option<OALocation>,
    host_venue: Option<OAVenue>,
    #[serde(default)]
    topics: Vec<OATopic>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: OAAuthor,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OALocation {
    landing_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAVenue {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OATopic {
    display_name: Option<String>,
}
