//! Deduplication of papers across catalogs.
//!
//! Two records describe the same paper when their DOIs match after
//! normalization, or when their normalized titles are within a small edit
//! distance of each other.

use std::collections::HashSet;

use strsim::levenshtein;

use crate::models::PaperRecord;

/// Titles closer than this edit distance are treated as the same paper
pub const DEFAULT_TITLE_DISTANCE: usize = 3;

const DOI_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Lowercase a DOI and strip any resolver scheme in front of it
pub fn normalize_doi(doi: &str) -> String {
    let mut doi = doi.trim().to_lowercase();
    for prefix in DOI_PREFIXES {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.trim().to_string();
            break;
        }
    }
    doi
}

/// Lowercase a title and drop everything that is not an ASCII letter or digit
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Outcome of checking one candidate against the accepted set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupVerdict {
    Accept,
    DuplicateDoi(String),
    SimilarTitle { distance: usize },
}

impl DedupVerdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, DedupVerdict::Accept)
    }
}

/// Incrementally built view of accepted records
///
/// Keeps normalized keys so each check costs one hash lookup plus one
/// edit-distance computation per accepted title of similar length.
#[derive(Debug, Clone)]
pub struct DedupIndex {
    threshold: usize,
    dois: HashSet<String>,
    titles: Vec<String>,
}

impl Default for DedupIndex {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_DISTANCE)
    }
}

impl DedupIndex {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            dois: HashSet::new(),
            titles: Vec::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Check a candidate without recording it
    pub fn check(&self, candidate: &PaperRecord) -> DedupVerdict {
        if let Some(doi) = candidate.doi.as_deref().map(normalize_doi) {
            if !doi.is_empty() && self.dois.contains(&doi) {
                return DedupVerdict::DuplicateDoi(doi);
            }
        }

        let title = normalize_title(&candidate.title);
        for accepted in &self.titles {
            // Edit distance is at least the length difference; titles are ASCII here.
            if accepted.len().abs_diff(title.len()) >= self.threshold {
                continue;
            }
            let distance = levenshtein(&title, accepted);
            if distance < self.threshold {
                return DedupVerdict::SimilarTitle { distance };
            }
        }

        DedupVerdict::Accept
    }

    /// Record a candidate as accepted
    pub fn insert(&mut self, record: &PaperRecord) {
        if let Some(doi) = record.doi.as_deref().map(normalize_doi) {
            if !doi.is_empty() {
                self.dois.insert(doi);
            }
        }
        self.titles.push(normalize_title(&record.title));
    }

    /// Check and, when unique, record the candidate in one step
    pub fn admit(&mut self, candidate: &PaperRecord) -> DedupVerdict {
        let verdict = self.check(candidate);
        if verdict.is_accept() {
            self.insert(candidate);
        }
        verdict
    }
}

/// Decide whether `candidate` is new relative to `accepted`
pub fn accept(candidate: &PaperRecord, accepted: &[PaperRecord]) -> bool {
    accept_with_threshold(candidate, accepted, DEFAULT_TITLE_DISTANCE)
}

/// [`accept`] with an explicit title distance threshold
pub fn accept_with_threshold(
    candidate: &PaperRecord,
    accepted: &[PaperRecord],
    threshold: usize,
) -> bool {
    let mut index = DedupIndex::new(threshold);
    for record in accepted {
        index.insert(record);
    }
    index.check(candidate).is_accept()
}

fn are_duplicates(a: &PaperRecord, b: &PaperRecord, threshold: usize) -> bool {
    let mut index = DedupIndex::new(threshold);
    index.insert(a);
    !index.check(b).is_accept()
}

/// Find groups of indices that describe the same paper
///
/// Each group starts with the first occurrence; only groups of two or more
/// are returned.
pub fn find_duplicates(papers: &[PaperRecord]) -> Vec<Vec<usize>> {
    find_duplicates_with_threshold(papers, DEFAULT_TITLE_DISTANCE)
}

/// [`find_duplicates`] with an explicit title distance threshold
pub fn find_duplicates_with_threshold(papers: &[PaperRecord], threshold: usize) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut processed: HashSet<usize> = HashSet::new();

    for (i, paper_i) in papers.iter().enumerate() {
        if processed.contains(&i) {
            continue;
        }

        let mut group = vec![i];
        for (j, paper_j) in papers.iter().enumerate().skip(i + 1) {
            if !processed.contains(&j) && are_duplicates(paper_i, paper_j, threshold) {
                group.push(j);
                processed.insert(j);
            }
        }

        if group.len() > 1 {
            groups.push(group);
        }
        processed.insert(i);
    }

    groups
}

/// Remove duplicates, keeping the first occurrence of each paper
pub fn deduplicate_papers(papers: Vec<PaperRecord>) -> Vec<PaperRecord> {
    deduplicate_papers_with_threshold(papers, DEFAULT_TITLE_DISTANCE)
}

pub fn deduplicate_papers_with_threshold(
    papers: Vec<PaperRecord>,
    threshold: usize,
) -> Vec<PaperRecord> {
    let mut index = DedupIndex::new(threshold);
    papers
        .into_iter()
        .filter(|paper| index.admit(paper).is_accept())
        .collect()
}
