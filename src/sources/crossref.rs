//! Crossref research source implementation.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use super::{capped_labels, status_error};
use crate::config::Config;
use crate::models::{PaperBuilder, PaperRecord, SearchQuery, SearchResponse, SourceType};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const MAX_SUBJECTS: usize = 5;

/// Crossref research source
///
/// Uses the Crossref REST API `works` endpoint. Every Crossref record is
/// keyed by its DOI.
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: HttpClient,
    base_url: String,
    mailto: Option<String>,
}

impl CrossRefSource {
    pub fn new(client: HttpClient, base_url: impl Into<String>, mailto: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mailto,
        }
    }

    pub fn from_config(client: HttpClient, config: &Config) -> Self {
        Self::new(
            client,
            &config.sources.crossref_url,
            config.sources.mailto.clone(),
        )
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn parse_item(item: CRItem) -> Option<PaperRecord> {
        let doi = item.doi.filter(|d| !d.trim().is_empty())?;
        let title = item
            .title
            .into_iter()
            .next()
            .filter(|t| !t.trim().is_empty())?;

        let year = item
            .published
            .and_then(|p| p.date_parts.into_iter().next())
            .and_then(|parts| parts.into_iter().next())
            .flatten()
            .unwrap_or(0);

        let authors = item.author.into_iter().map(|a| {
            format!(
                "{} {}",
                a.given.unwrap_or_default(),
                a.family.unwrap_or_default()
            )
            .trim()
            .to_string()
        });

        let url = item
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://doi.org/{}", doi));

        Some(
            PaperBuilder::new(doi.clone(), title, SourceType::CrossRef)
                .doi(doi)
                .authors(authors.filter(|a| !a.is_empty()))
                .abstract_text(strip_markup(item.r#abstract.as_deref().unwrap_or_default()))
                .year(year)
                .citation_count(item.is_referenced_by_count.unwrap_or(0))
                .url(url)
                .venue(item.container_title.into_iter().next().unwrap_or_default())
                .fields_of_study(capped_labels(item.subject, MAX_SUBJECTS))
                .build(),
        )
    }
}

/// Remove JATS/HTML tags from an abstract and collapse whitespace
fn strip_markup(text: &str) -> String {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    let stripped = match TAGS.get_or_init(|| Regex::new(r"<[^>]+>").ok()) {
        Some(re) => re.replace_all(text, " ").to_string(),
        None => text.to_string(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Source for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn source_type(&self) -> SourceType {
        SourceType::CrossRef
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let mut url = format!(
            "/works?query={}&rows={}",
            urlencoding::encode(query.trimmed()),
            query.max_results
        );
        if let Some(ref mailto) = self.mailto {
            url = format!("{}&mailto={}", url, urlencoding::encode(mailto));
        }

        let response = self
            .client
            .client()
            .get(self.build_url(&url))
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search CrossRef: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("CrossRef", response.status()));
        }

        let data: CRResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let papers: Vec<PaperRecord> = data
            .message
            .items
            .into_iter()
            .filter_map(Self::parse_item)
            .collect();
        let mut response = SearchResponse::new(papers, SourceType::CrossRef, query.trimmed());
        response.total_results = data.message.total_results;
        Ok(response)
    }
}

// ===== Crossref API Types =====

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<CRItem>,
    #[serde(rename = "total-results")]
    total_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    r#abstract: Option<String>,
    published: Option<CRDate>,
    #[serde(rename = "is-referenced-by-count")]
    is_referenced_by_count: Option<u32>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(default)]
    subject: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<u32>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parse(value: serde_json::Value) -> Option<PaperRecord> {
        CrossRefSource::parse_item(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_parse_item() {
        let paper = parse(json!({
            "DOI": "10.1000/xyz123",
            "title": ["Deep Learning for X", "Subtitle"],
            "author": [
                {"given": "Ada", "family": "Lovelace"},
                {"family": "Turing"}
            ],
            "abstract": "<jats:p>We study <jats:italic>things</jats:italic>.</jats:p>",
            "published": {"date-parts": [[2019, 5, 1]]},
            "is-referenced-by-count": 12,
            "container-title": ["Journal of X"],
            "subject": ["a", "b", "c", "d", "e", "f", "g"]
        }))
        .unwrap();

        assert_eq!(paper.id, "10.1000/xyz123");
        assert_eq!(paper.doi.as_deref(), Some("10.1000/xyz123"));
        assert_eq!(paper.title, "Deep Learning for X");
        assert_eq!(paper.authors, vec!["Ada Lovelace", "Turing"]);
        assert_eq!(paper.abstract_text, "We study things .");
        assert_eq!(paper.year, 2019);
        assert_eq!(paper.citation_count, 12);
        assert_eq!(paper.url.as_deref(), Some("https://doi.org/10.1000/xyz123"));
        assert_eq!(paper.venue.as_deref(), Some("Journal of X"));
        assert_eq!(paper.fields_of_study.len(), 5);
    }

    #[test]
    fn test_parse_item_requires_title_and_doi() {
        assert!(parse(json!({"DOI": "10.1/a", "title": []})).is_none());
        assert!(parse(json!({"title": ["T"]})).is_none());
        let paper = parse(json!({
            "DOI": "10.1/a",
            "title": ["T"],
            "published": {"date-parts": [[null]]}
        }))
        .unwrap();
        assert_eq!(paper.year, 0);
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("plain  text"), "plain text");
        assert_eq!(strip_markup("<p>a</p><p>b</p>"), "a b");
    }

    #[tokio::test]
    async fn test_search_uses_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("query", "llm"))
            .and(query_param("rows", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "message": {
                    "total-results": 2,
                    "items": [
                        {"DOI": "10.1/a", "title": ["A"]},
                        {"DOI": "10.1/b", "title": []}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = CrossRefSource::new(HttpClient::new().unwrap(), server.uri(), None);
        let response = source.search(&SearchQuery::new("llm").max_results(3)).await.unwrap();
        assert_eq!(response.papers.len(), 1);
        assert_eq!(response.total_results, Some(2));
    }
}
