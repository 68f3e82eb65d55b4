//! Integration tests for the citation mesh
//!
//! The citation client runs against a local mock of the graph API; the
//! session tests drive it end to end.

use paper_mesh::config::CitationConfig;
use paper_mesh::mesh::{
    CitationClient, ExpandOutcome, GraphSession, LookupId, MeshError, NodeState,
};
use paper_mesh::models::{EdgeKind, GraphEdge, NodeRole};
use paper_mesh::utils::HttpClient;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BACKOFF_MS: u64 = 50;

fn client(server: &MockServer) -> CitationClient {
    let config = CitationConfig {
        base_url: server.uri(),
        max_attempts: 3,
        backoff_base_ms: BACKOFF_MS,
        inter_request_pause_ms: 0,
        ..CitationConfig::default()
    };
    CitationClient::new(HttpClient::new().unwrap(), &config, None)
}

fn lookup(id: &str) -> LookupId {
    LookupId::from_paper_id(id).unwrap()
}

fn paper(id: &str) -> Value {
    json!({
        "paperId": id,
        "title": format!("Paper {id}"),
        "authors": [{"name": "A. Author"}],
        "year": 2021
    })
}

/// Serve detail, references and citations for `id`
async fn mount_neighborhood(
    server: &MockServer,
    id: &str,
    references: &[&str],
    citations: &[&str],
) {
    Mock::given(method("GET"))
        .and(path(format!("/paper/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(paper(id)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/paper/{id}/references")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": references.iter().map(|r| json!({"citedPaper": paper(r)})).collect::<Vec<_>>()
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/paper/{id}/citations")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": citations.iter().map(|c| json!({"citingPaper": paper(c)})).collect::<Vec<_>>()
        })))
        .mount(server)
        .await;
}

async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn test_neighborhood_calls_are_sequential() {
    let server = MockServer::start().await;
    mount_neighborhood(&server, "p1", &["r1"], &["k1"]).await;

    let raw = client(&server).fetch_neighborhood(&lookup("p1")).await.unwrap();
    assert_eq!(raw.center["paperId"], "p1");
    assert_eq!(raw.references["data"][0]["citedPaper"]["paperId"], "r1");
    assert_eq!(raw.citations["data"][0]["citingPaper"]["paperId"], "k1");

    assert_eq!(
        request_paths(&server).await,
        vec!["/paper/p1", "/paper/p1/references", "/paper/p1/citations"]
    );
}

#[tokio::test]
async fn test_throttled_once_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/paper/p1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_neighborhood(&server, "p1", &[], &[]).await;

    let started = Instant::now();
    let raw = client(&server).fetch_neighborhood(&lookup("p1")).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(BACKOFF_MS));
    assert_eq!(raw.center["paperId"], "p1");

    let paths = request_paths(&server).await;
    assert_eq!(paths.len(), 4);
    assert_eq!(paths[0], "/paper/p1");
    assert_eq!(paths[1], "/paper/p1");
}

#[tokio::test]
async fn test_throttled_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/paper/p1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let started = Instant::now();
    let err = client(&server)
        .fetch_neighborhood(&lookup("p1"))
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert!(matches!(err, MeshError::RateLimitExceeded { attempts: 3, .. }));
    // Waits only between attempts: base, then twice the base.
    assert!(started.elapsed() >= Duration::from_millis(BACKOFF_MS * 3));
    assert_eq!(request_paths(&server).await.len(), 3);
}

#[tokio::test]
async fn test_other_http_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/paper/p1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_neighborhood(&lookup("p1"))
        .await
        .unwrap_err();
    match err {
        MeshError::ProviderError { status, endpoint } => {
            assert_eq!(status, 404);
            assert!(endpoint.starts_with("/paper/p1?fields="));
        }
        other => panic!("expected ProviderError, got {other:?}"),
    }
    assert_eq!(request_paths(&server).await.len(), 1);
}

#[tokio::test]
async fn test_failure_mid_neighborhood_stops_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/paper/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paper("p1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/paper/p1/references"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_neighborhood(&lookup("p1"))
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::ProviderError { status: 500, .. }));
    assert_eq!(
        request_paths(&server).await,
        vec!["/paper/p1", "/paper/p1/references"]
    );
}

#[tokio::test]
async fn test_session_open_and_expand() {
    let server = MockServer::start().await;
    mount_neighborhood(&server, "p1", &["n1", "r2"], &["k1"]).await;
    mount_neighborhood(&server, "n1", &["n2", "p1"], &["r2"]).await;

    let session = GraphSession::open(Arc::new(client(&server)), lookup("p1"))
        .await
        .unwrap();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.center_id, "p1");
    assert_eq!(snapshot.nodes.len(), 4);
    assert_eq!(snapshot.edges.len(), 3);

    let outcome = session.expand("n1").await.unwrap();
    let delta = match outcome {
        ExpandOutcome::Expanded(delta) => delta,
        other => panic!("expected expansion, got {other:?}"),
    };
    assert_eq!(delta.nodes.len(), 1);
    assert_eq!(delta.nodes[0].id, "n2");
    assert_eq!(delta.nodes[0].role, NodeRole::Expanded);
    assert_eq!(delta.edges, vec![GraphEdge::new("n1", "n2", EdgeKind::Reference)]);

    assert_eq!(session.node("p1").unwrap().role, NodeRole::Center);
    assert_eq!(session.node("r2").unwrap().role, NodeRole::Reference);
    assert_eq!(session.node_count(), 5);
    assert_eq!(session.edge_count(), 4);
    assert_eq!(session.node_state("n1"), Some(NodeState::Expanded));

    let again = session.expand("n1").await.unwrap();
    assert!(again.is_rejected());
    assert_eq!(session.node_count(), 5);
    assert_eq!(session.edge_count(), 4);
}

#[tokio::test]
async fn test_rate_limited_expansion_stays_retryable() {
    let server = MockServer::start().await;
    mount_neighborhood(&server, "p1", &["n1"], &[]).await;
    Mock::given(method("GET"))
        .and(path("/paper/n1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_neighborhood(&server, "n1", &["n2"], &[]).await;

    let session = GraphSession::open(Arc::new(client(&server)), lookup("p1"))
        .await
        .unwrap();

    let err = session.expand("n1").await.unwrap_err();
    assert!(err.is_rate_limited());
    assert!(session.expanded_ids().is_empty());
    assert!(session.in_flight().is_none());
    assert_eq!(session.node_count(), 2);

    let outcome = session.expand("n1").await.unwrap();
    assert_eq!(outcome.delta().map(|d| d.nodes.len()), Some(1));
    assert_eq!(session.node_state("n1"), Some(NodeState::Expanded));
}
