//! Paper model representing one search hit from one catalog.

use serde::{Deserialize, Serialize};

/// The catalog a record was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "semantic-scholar")]
    SemanticScholar,
    #[serde(rename = "openalex")]
    OpenAlex,
    #[serde(rename = "crossref")]
    CrossRef,
}

impl SourceType {
    /// All catalogs, in the order searches fan out to them
    pub const ALL: [SourceType; 3] = [
        SourceType::SemanticScholar,
        SourceType::OpenAlex,
        SourceType::CrossRef,
    ];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::OpenAlex => "OpenAlex",
            SourceType::CrossRef => "CrossRef",
        }
    }

    /// Returns the source identifier (registry key, CLI value)
    pub fn id(&self) -> &'static str {
        match self {
            SourceType::SemanticScholar => "semantic",
            SourceType::OpenAlex => "openalex",
            SourceType::CrossRef => "crossref",
        }
    }

    /// Parse a source identifier, accepting a few common spellings
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "semantic" | "semantic_scholar" | "semanticscholar" | "s2" => {
                Some(SourceType::SemanticScholar)
            }
            "openalex" => Some(SourceType::OpenAlex),
            "crossref" => Some(SourceType::CrossRef),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A paper as reported by a single catalog
///
/// Records are created once by a source adapter and never mutated by the
/// search pipeline afterwards. `year` and `citation_count` use `0` for
/// "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    /// Provider-scoped identifier (not globally unique)
    pub id: String,

    /// Digital Object Identifier, without resolver prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    pub title: String,

    /// Author display names in catalog order
    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(rename = "abstract", default)]
    pub abstract_text: String,

    #[serde(default)]
    pub year: u32,

    #[serde(default)]
    pub citation_count: u32,

    pub source: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_of_study: Vec<String>,
}

impl PaperRecord {
    /// Create a new record with required fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: SourceType) -> Self {
        Self {
            id: id.into(),
            doi: None,
            title: title.into(),
            authors: Vec::new(),
            abstract_text: String::new(),
            year: 0,
            citation_count: 0,
            source,
            url: None,
            venue: None,
            fields_of_study: Vec::new(),
        }
    }

    /// DOI if available, else the provider id
    pub fn primary_id(&self) -> &str {
        self.doi.as_deref().unwrap_or(&self.id)
    }

    /// Authors joined for single-line display
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    pub fn year_known(&self) -> Option<u32> {
        (self.year != 0).then_some(self.year)
    }
}

/// Builder for constructing [`PaperRecord`] values in adapters and tests
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: PaperRecord,
}

impl PaperBuilder {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: SourceType) -> Self {
        Self {
            paper: PaperRecord::new(id, title, source),
        }
    }

    /// Set DOI; blank values are ignored
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        if !doi.trim().is_empty() {
            self.paper.doi = Some(doi.trim().to_string());
        }
        self
    }

    pub fn maybe_doi(self, doi: Option<String>) -> Self {
        match doi {
            Some(doi) => self.doi(doi),
            None => self,
        }
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.abstract_text = abstract_text.into();
        self
    }

    pub fn year(mut self, year: u32) -> Self {
        self.paper.year = year;
        self
    }

    pub fn citation_count(mut self, count: u32) -> Self {
        self.paper.citation_count = count;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.paper.url = Some(url.into());
        self
    }

    /// Set venue; blank values are ignored
    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        let venue = venue.into();
        if !venue.trim().is_empty() {
            self.paper.venue = Some(venue);
        }
        self
    }

    pub fn fields_of_study<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.fields_of_study = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> PaperRecord {
        self.paper
    }
}
