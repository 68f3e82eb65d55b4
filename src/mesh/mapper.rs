//! Maps raw citation API responses onto the graph model.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::models::{EdgeKind, GraphEdge, GraphFragment, GraphNode, NodeRole};

pub const UNKNOWN_TITLE: &str = "Unknown Title";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeshPaper {
    paper_id: Option<String>,
    title: Option<String>,
    authors: Option<Vec<MeshAuthor>>,
    year: Option<u32>,
    citation_count: Option<u32>,
    url: Option<String>,
    external_ids: Option<MeshExternalIds>,
}

#[derive(Debug, Deserialize)]
struct MeshAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeshExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeEntry {
    cited_paper: Option<MeshPaper>,
    citing_paper: Option<MeshPaper>,
}

impl MeshPaper {
    fn id(&self) -> Option<&str> {
        self.paper_id.as_deref().filter(|id| !id.is_empty())
    }

    fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    fn into_node(self, id: String, role: NodeRole) -> GraphNode {
        let authors = self
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ");
        let url = self
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{}", id));

        GraphNode {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            authors,
            year: self.year.unwrap_or(0),
            citation_count: self.citation_count.unwrap_or(0),
            role,
            url: Some(url),
            doi: self.external_ids.and_then(|ids| ids.doi),
            id,
        }
    }
}

/// Papers listed under `data[].<key>` of a references/citations response
fn listed_papers(raw: &Value, pick: fn(EdgeEntry) -> Option<MeshPaper>) -> Vec<MeshPaper> {
    let Some(entries) = raw.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| EdgeEntry::deserialize(entry).ok())
        .filter_map(pick)
        .filter(|paper| paper.id().is_some() && paper.has_title())
        .collect()
}

/// Build the nodes and edges for one neighborhood
///
/// The center node takes the id reported in `raw_center`, falling back to
/// `root_id`. References become `center -> ref` edges and citers become
/// `citer -> center` edges. Entries without an id or title are skipped, and
/// an id seen earlier in the same mapping adds its edge but no second node.
pub fn map_to_graph(
    root_id: &str,
    raw_center: &Value,
    raw_references: &Value,
    raw_citations: &Value,
) -> GraphFragment {
    let center = MeshPaper::deserialize(raw_center).unwrap_or_default();
    let center_id = center.id().unwrap_or(root_id).to_string();

    let mut seen: HashSet<String> = HashSet::new();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    seen.insert(center_id.clone());
    nodes.push(center.into_node(center_id.clone(), NodeRole::Center));

    let references = listed_papers(raw_references, |e| e.cited_paper);
    let citations = listed_papers(raw_citations, |e| e.citing_paper);

    for (papers, role) in [(references, NodeRole::Reference), (citations, NodeRole::Citation)] {
        for paper in papers {
            let Some(id) = paper.id().map(str::to_string) else {
                continue;
            };
            if id == center_id {
                continue;
            }
            let edge = match role {
                NodeRole::Citation => {
                    GraphEdge::new(id.clone(), center_id.clone(), EdgeKind::Citation)
                }
                _ => GraphEdge::new(center_id.clone(), id.clone(), EdgeKind::Reference),
            };
            if seen.insert(id.clone()) {
                nodes.push(paper.into_node(id, role));
            }
            edges.push(edge);
        }
    }

    GraphFragment {
        root_id: center_id,
        nodes,
        edges,
    }
}
