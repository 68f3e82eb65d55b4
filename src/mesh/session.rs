//! One exploration session over a growing citation graph.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{map_to_graph, LookupId, MeshError, NeighborhoodFetcher};
use crate::models::{
    EdgeKind, GraphDelta, GraphEdge, GraphFragment, GraphNode, GraphSnapshot, LayoutEvent,
    NodeRole,
};

/// Expansion state of a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unexpanded,
    Expanding,
    Expanded,
}

/// Why an expansion request was ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    IsCenter,
    AlreadyExpanded,
    InFlight { current: String },
    UnknownNode,
}

/// Result of [`GraphSession::expand`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandOutcome {
    Expanded(GraphDelta),
    Rejected(RejectReason),
}

impl ExpandOutcome {
    pub fn delta(&self) -> Option<&GraphDelta> {
        match self {
            ExpandOutcome::Expanded(delta) => Some(delta),
            ExpandOutcome::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ExpandOutcome::Rejected(_))
    }
}

#[derive(Debug)]
struct GraphState {
    center_id: String,
    nodes: HashMap<String, GraphNode>,
    order: Vec<String>,
    edges: Vec<GraphEdge>,
    expanded_ids: HashSet<String>,
    in_flight: Option<String>,
}

impl GraphState {
    fn from_fragment(fragment: GraphFragment) -> Self {
        let mut state = Self {
            center_id: fragment.root_id,
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: fragment.edges,
            expanded_ids: HashSet::new(),
            in_flight: None,
        };
        for node in fragment.nodes {
            state.insert(node);
        }
        state
    }

    /// Returns false when the id is already present
    fn insert(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        true
    }

    fn check(&self, node_id: &str) -> Option<RejectReason> {
        if node_id == self.center_id {
            return Some(RejectReason::IsCenter);
        }
        if self.expanded_ids.contains(node_id) {
            return Some(RejectReason::AlreadyExpanded);
        }
        if let Some(current) = &self.in_flight {
            return Some(RejectReason::InFlight {
                current: current.clone(),
            });
        }
        if !self.nodes.contains_key(node_id) {
            return Some(RejectReason::UnknownNode);
        }
        None
    }

    /// Insert genuinely new nodes as `expanded`, one reference edge each
    fn merge(&mut self, node_id: &str, fragment: GraphFragment) -> GraphDelta {
        let mut delta = GraphDelta {
            expanded: node_id.to_string(),
            ..GraphDelta::default()
        };
        for mut node in fragment.nodes {
            if node.id == node_id || node.id == fragment.root_id {
                continue;
            }
            node.role = NodeRole::Expanded;
            let edge = GraphEdge::new(node_id, node.id.clone(), EdgeKind::Reference);
            if self.insert(node.clone()) {
                self.edges.push(edge.clone());
                delta.nodes.push(node);
                delta.edges.push(edge);
            }
        }
        delta
    }
}

/// Clears the in-flight marker if the expansion does not finish normally
struct InFlightGuard<'a> {
    state: &'a Mutex<GraphState>,
    node_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if state.in_flight.as_deref() == Some(self.node_id.as_str()) {
            state.in_flight = None;
        }
    }
}

fn lock(state: &Mutex<GraphState>) -> MutexGuard<'_, GraphState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Accumulated graph for one exploration, grown one expansion at a time.
///
/// Nodes and edges are only ever added. At most one expansion runs at a
/// time: a request arriving while another is in flight is dropped, not
/// queued.
#[derive(Debug)]
pub struct GraphSession {
    fetcher: Arc<dyn NeighborhoodFetcher>,
    state: Mutex<GraphState>,
}

impl GraphSession {
    /// Fetch the root neighborhood and start a session around it
    pub async fn open(
        fetcher: Arc<dyn NeighborhoodFetcher>,
        root: LookupId,
    ) -> Result<Self, MeshError> {
        let raw = fetcher.fetch_neighborhood(&root).await?;
        let fragment = map_to_graph(root.as_str(), &raw.center, &raw.references, &raw.citations);
        info!(
            root = %root,
            nodes = fragment.nodes.len(),
            edges = fragment.edges.len(),
            "Opened citation mesh"
        );
        Ok(Self::from_fragment(fetcher, fragment))
    }

    pub fn from_fragment(fetcher: Arc<dyn NeighborhoodFetcher>, fragment: GraphFragment) -> Self {
        Self {
            fetcher,
            state: Mutex::new(GraphState::from_fragment(fragment)),
        }
    }

    pub fn center_id(&self) -> String {
        lock(&self.state).center_id.clone()
    }

    /// Full node and edge set, nodes in discovery order
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = lock(&self.state);
        GraphSnapshot {
            center_id: state.center_id.clone(),
            nodes: state
                .order
                .iter()
                .filter_map(|id| state.nodes.get(id).cloned())
                .collect(),
            edges: state.edges.clone(),
        }
    }

    pub fn node(&self, id: &str) -> Option<GraphNode> {
        lock(&self.state).nodes.get(id).cloned()
    }

    /// `None` for ids not in the graph
    pub fn node_state(&self, id: &str) -> Option<NodeState> {
        let state = lock(&self.state);
        if !state.nodes.contains_key(id) {
            return None;
        }
        if state.in_flight.as_deref() == Some(id) {
            Some(NodeState::Expanding)
        } else if state.expanded_ids.contains(id) {
            Some(NodeState::Expanded)
        } else {
            Some(NodeState::Unexpanded)
        }
    }

    pub fn expanded_ids(&self) -> HashSet<String> {
        lock(&self.state).expanded_ids.clone()
    }

    pub fn in_flight(&self) -> Option<String> {
        lock(&self.state).in_flight.clone()
    }

    pub fn node_count(&self) -> usize {
        lock(&self.state).nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        lock(&self.state).edges.len()
    }

    /// Expand one node by fetching what it references and cites.
    ///
    /// Rejections (center, already expanded, another expansion in flight,
    /// unknown id) leave the graph untouched. A failed fetch is returned as
    /// an error and the node stays expandable.
    pub async fn expand(&self, node_id: &str) -> Result<ExpandOutcome, MeshError> {
        let guard = {
            let mut state = lock(&self.state);
            if let Some(reason) = state.check(node_id) {
                debug!(node = node_id, ?reason, "Expansion rejected");
                return Ok(ExpandOutcome::Rejected(reason));
            }
            state.in_flight = Some(node_id.to_string());
            InFlightGuard {
                state: &self.state,
                node_id: node_id.to_string(),
            }
        };

        let lookup = LookupId::from_paper_id(node_id)?;
        let raw = match self.fetcher.fetch_neighborhood(&lookup).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(node = node_id, error = %e, "Expansion failed");
                return Err(e);
            }
        };
        let fragment = map_to_graph(node_id, &raw.center, &raw.references, &raw.citations);

        let delta = {
            let mut state = lock(&self.state);
            let delta = state.merge(node_id, fragment);
            state.expanded_ids.insert(node_id.to_string());
            state.in_flight = None;
            delta
        };
        drop(guard);

        info!(
            node = node_id,
            new_nodes = delta.nodes.len(),
            "Expanded node"
        );
        Ok(ExpandOutcome::Expanded(delta))
    }

    /// Clicks expand; position updates are layout state and ignored
    pub async fn handle_layout_event(
        &self,
        event: &LayoutEvent,
    ) -> Option<Result<ExpandOutcome, MeshError>> {
        match event {
            LayoutEvent::NodeClicked { id } => Some(self.expand(id).await),
            LayoutEvent::NodeMoved { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::mock::{neighborhood, MockFetcher};

    fn initial_fragment(references: &[&str]) -> GraphFragment {
        let raw = neighborhood("c", references, &[]);
        map_to_graph("c", &raw.center, &raw.references, &raw.citations)
    }

    async fn open(fetcher: MockFetcher) -> (Arc<MockFetcher>, GraphSession) {
        let fetcher = Arc::new(fetcher);
        let session = GraphSession::open(fetcher.clone(), LookupId::from_paper_id("c").unwrap())
            .await
            .unwrap();
        (fetcher, session)
    }

    #[tokio::test]
    async fn test_open_builds_initial_graph() {
        let fetcher = MockFetcher::new().with_neighborhood("c", &["r1", "r2"], &["k1"]);
        let (_, session) = open(fetcher).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.center_id, "c");
        assert_eq!(snapshot.nodes.len(), 4);
        assert_eq!(snapshot.nodes[0].role, NodeRole::Center);
        assert_eq!(snapshot.edges.len(), 3);
        assert_eq!(session.node_state("r1"), Some(NodeState::Unexpanded));
        assert_eq!(session.node_state("zzz"), None);
    }

    #[tokio::test]
    async fn test_open_failure_propagates() {
        let fetcher = Arc::new(MockFetcher::new().with_error(
            "c",
            MeshError::RateLimitExceeded {
                attempts: 3,
                hint: "wait".to_string(),
            },
        ));
        let err = GraphSession::open(fetcher, LookupId::from_paper_id("c").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_expand_relabels_new_nodes() {
        let (_, session) = open(
            MockFetcher::new()
                .with_neighborhood("c", &["n1"], &[])
                .with_neighborhood("n1", &["n2", "c"], &[]),
        )
        .await;

        let outcome = session.expand("n1").await.unwrap();
        let delta = outcome.delta().unwrap();
        assert_eq!(delta.nodes.len(), 1);
        assert_eq!(delta.nodes[0].id, "n2");
        assert_eq!(delta.nodes[0].role, NodeRole::Expanded);
        assert_eq!(delta.edges, vec![GraphEdge::new("n1", "n2", EdgeKind::Reference)]);

        assert_eq!(session.node("c").unwrap().role, NodeRole::Center);
        assert_eq!(session.node_count(), 3);
        assert_eq!(session.edge_count(), 2);
        assert_eq!(session.node_state("n1"), Some(NodeState::Expanded));
    }

    #[tokio::test]
    async fn test_expand_citers_become_reference_edges() {
        let (_, session) = open(
            MockFetcher::new()
                .with_neighborhood("c", &["n1"], &[])
                .with_neighborhood("n1", &[], &["k9"]),
        )
        .await;
        let outcome = session.expand("n1").await.unwrap();
        assert_eq!(
            outcome.delta().unwrap().edges,
            vec![GraphEdge::new("n1", "k9", EdgeKind::Reference)]
        );
    }

    #[tokio::test]
    async fn test_center_never_expands() {
        let (fetcher, session) =
            open(MockFetcher::new().with_neighborhood("c", &["r1"], &[])).await;
        let before = session.snapshot();
        let outcome = session.expand("c").await.unwrap();
        assert_eq!(outcome, ExpandOutcome::Rejected(RejectReason::IsCenter));
        assert_eq!(session.snapshot(), before);
        assert!(session.expanded_ids().is_empty());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_second_expand_is_noop() {
        let (fetcher, session) = open(
            MockFetcher::new()
                .with_neighborhood("c", &["n1"], &[])
                .with_neighborhood("n1", &["n2"], &[]),
        )
        .await;
        session.expand("n1").await.unwrap();
        let before = session.snapshot();
        let outcome = session.expand("n1").await.unwrap();
        assert_eq!(outcome, ExpandOutcome::Rejected(RejectReason::AlreadyExpanded));
        assert_eq!(session.snapshot(), before);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_node_rejected() {
        let (_, session) = open(MockFetcher::new().with_neighborhood("c", &["r1"], &[])).await;
        let outcome = session.expand("nope").await.unwrap();
        assert_eq!(outcome, ExpandOutcome::Rejected(RejectReason::UnknownNode));
    }

    #[tokio::test]
    async fn test_failed_expand_stays_retryable() {
        let (fetcher, session) = open(
            MockFetcher::new()
                .with_neighborhood("c", &["n1"], &[])
                .with_error(
                    "n1",
                    MeshError::ProviderError {
                        status: 500,
                        endpoint: "/paper/n1".to_string(),
                    },
                ),
        )
        .await;

        assert!(session.expand("n1").await.is_err());
        assert!(session.in_flight().is_none());
        assert!(session.expanded_ids().is_empty());
        assert_eq!(session.node_state("n1"), Some(NodeState::Unexpanded));

        fetcher.set_response("n1", Ok(neighborhood("n1", &["n2"], &[])));
        let outcome = session.expand("n1").await.unwrap();
        assert_eq!(outcome.delta().unwrap().nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_expand_dropped() {
        let gated = Arc::new(
            MockFetcher::new()
                .gated()
                .with_neighborhood("n1", &["x"], &[])
                .with_neighborhood("n2", &["y"], &[]),
        );
        let session = Arc::new(GraphSession::from_fragment(
            gated.clone(),
            initial_fragment(&["n1", "n2"]),
        ));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.expand("n1").await })
        };
        while gated.calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(session.node_state("n1"), Some(NodeState::Expanding));
        let before = session.snapshot();
        let second = session.expand("n2").await.unwrap();
        assert_eq!(
            second,
            ExpandOutcome::Rejected(RejectReason::InFlight {
                current: "n1".to_string()
            })
        );
        let repeat = session.expand("n1").await.unwrap();
        assert!(repeat.is_rejected());
        assert_eq!(session.snapshot(), before);

        gated.release();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.delta().unwrap().nodes[0].id, "x");
        assert_eq!(gated.calls(), 1);
        assert!(session.in_flight().is_none());
        assert_eq!(session.node_state("n2"), Some(NodeState::Unexpanded));
    }

    #[tokio::test]
    async fn test_dropped_expand_releases_marker() {
        let gated = Arc::new(
            MockFetcher::new()
                .gated()
                .with_neighborhood("n1", &["x"], &[]),
        );
        let session = Arc::new(GraphSession::from_fragment(
            gated.clone(),
            initial_fragment(&["n1"]),
        ));

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.expand("n1").await })
        };
        while gated.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.in_flight().as_deref(), Some("n1"));
        task.abort();
        let _ = task.await;

        assert!(session.in_flight().is_none());
        assert_eq!(session.node_state("n1"), Some(NodeState::Unexpanded));
    }

    #[tokio::test]
    async fn test_layout_events() {
        let (_, session) = open(
            MockFetcher::new()
                .with_neighborhood("c", &["n1"], &[])
                .with_neighborhood("n1", &["n2"], &[]),
        )
        .await;
        let moved = LayoutEvent::NodeMoved {
            id: "n1".to_string(),
            x: 10.0,
            y: 20.0,
        };
        assert!(session.handle_layout_event(&moved).await.is_none());

        let clicked = LayoutEvent::NodeClicked {
            id: "n1".to_string(),
        };
        let outcome = session.handle_layout_event(&clicked).await.unwrap().unwrap();
        assert!(!outcome.is_rejected());
        assert_eq!(session.node_count(), 3);
    }
}
