//! HTTP surface tests: JSON contracts, error codes, and the end-to-end
//! ingest/search flow over a real socket.

mod common;

use common::{multi_paragraph_content, setup};
use kb_gateway::server::router;
use serde_json::{json, Value};

async fn serve() -> String {
    let config = common::test_config();
    let (gateway, _index) = setup();
    let app = router(&config, gateway);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn healthz_reports_version() {
    let base = serve().await;
    let body: Value = reqwest::get(format!("{base}/healthz"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ingest_then_search_over_http() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/docs/ingest"))
        .json(&json!({
            "project_id": "p1",
            "doc_id": "d1",
            "title": "Runbook",
            "source": "wiki",
            "path_or_url": "kb://runbook",
            "content": multi_paragraph_content("runbook"),
            "acl_public": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["doc_version"].as_str().unwrap() > "");
    assert!(body["chunks_written"].as_i64().unwrap() >= 1);

    let resp = client
        .post(format!("{base}/v1/search"))
        .json(&json!({
            "query": "runbook revision",
            "project_scope": ["p1"],
            "principal": {"type": "internal_user", "id": "u1", "groups": []},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["doc_id"], "d1");
    assert_eq!(results[0]["title"], "Runbook");

    // Same search as a customer: internal-public content is invisible.
    let resp = client
        .post(format!("{base}/v1/search"))
        .json(&json!({
            "query": "runbook revision",
            "project_scope": ["p1"],
            "principal": {"type": "customer_user", "id": "c1", "groups": []},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_fields_is_a_400_with_code() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/docs/ingest"))
        .json(&json!({"project_id": "p1", "doc_id": "", "content": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "missing_fields");
}

#[tokio::test]
async fn malformed_body_is_invalid_json() {
    let base = serve().await;
    let client = reqwest::Client::new();

    // Well-formed JSON, wrong shape.
    let resp = client
        .post(format!("{base}/v1/search"))
        .json(&json!({"query": 42}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_json");

    // Not JSON at all: same contract, never axum's plain-text rejection.
    let resp = client
        .post(format!("{base}/v1/search"))
        .header("content-type", "application/json")
        .body("{not valid json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_json");
}

#[tokio::test]
async fn activate_requires_all_fields() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/docs/activate"))
        .json(&json!({"project_id": "p1", "doc_id": "d1", "doc_version": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "missing_fields");
}
