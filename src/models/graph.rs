//! Citation graph model shared by the mapper, the session and the renderer.

use serde::{Deserialize, Serialize};

/// How a node entered the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Center,
    Reference,
    Citation,
    Expanded,
}

/// Direction semantics of an edge
///
/// `Reference` points from the citing paper to the cited one.
/// `Citation` points from a citer into the explored paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Reference,
    Citation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Citation-API paper id, or a `DOI:<doi>` surrogate
    pub id: String,
    pub title: String,
    /// Author names joined with `", "`
    pub authors: String,
    pub year: u32,
    pub citation_count: u32,
    #[serde(rename = "type")]
    pub role: NodeRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl GraphNode {
    pub fn is_center(&self) -> bool {
        self.role == NodeRole::Center
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

/// Nodes and edges produced by one mapping of a neighborhood
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphFragment {
    /// Id of the fragment's center node
    pub root_id: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphFragment {
    pub fn center(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.is_center())
    }
}

/// What one successful expansion added to a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDelta {
    /// The node that was expanded
    pub expanded: String,
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "links")]
    pub edges: Vec<GraphEdge>,
}

impl GraphDelta {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Full node/edge set handed to the layout engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(rename = "paperId")]
    pub center_id: String,
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "links")]
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Interaction events emitted by the layout engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LayoutEvent {
    NodeClicked { id: String },
    NodeMoved { id: String, x: f64, y: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, role: NodeRole) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            title: format!("Paper {id}"),
            authors: String::new(),
            year: 0,
            citation_count: 0,
            role,
            url: None,
            doi: None,
        }
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = GraphSnapshot {
            center_id: "c".to_string(),
            nodes: vec![node("c", NodeRole::Center), node("r", NodeRole::Reference)],
            edges: vec![GraphEdge::new("c", "r", EdgeKind::Reference)],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["paperId"], "c");
        assert_eq!(json["nodes"][0]["type"], "center");
        assert_eq!(json["nodes"][1]["citationCount"], 0);
        assert_eq!(
            json["links"][0],
            serde_json::json!({"source": "c", "target": "r", "type": "reference"})
        );
        assert!(snapshot.node("r").is_some());
    }

    #[test]
    fn test_fragment_center() {
        let fragment = GraphFragment {
            root_id: "c".to_string(),
            nodes: vec![node("x", NodeRole::Citation), node("c", NodeRole::Center)],
            edges: vec![],
        };
        assert_eq!(fragment.center().map(|n| n.id.as_str()), Some("c"));
    }

    #[test]
    fn test_layout_event_parse() {
        let event: LayoutEvent =
            serde_json::from_str(r#"{"event":"nodeClicked","id":"n1"}"#).unwrap();
        assert_eq!(event, LayoutEvent::NodeClicked { id: "n1".to_string() });
        let event: LayoutEvent =
            serde_json::from_str(r#"{"event":"nodeMoved","id":"n1","x":1.5,"y":-2.0}"#).unwrap();
        assert!(matches!(event, LayoutEvent::NodeMoved { .. }));
    }
}
