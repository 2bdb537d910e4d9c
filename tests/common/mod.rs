//! Shared test support: an in-memory vector index honoring the same
//! contract as the Qdrant client, plus request builders.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use kb_gateway::config::Config;
use kb_gateway::embed::DeterministicEmbedder;
use kb_gateway::filter::Filter;
use kb_gateway::gateway::{Gateway, IngestRequest, SearchRequest};
use kb_gateway::index::{Point, ScoredPoint, VectorIndex};
use kb_gateway::models::{Principal, PrincipalType};

#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// In-memory stand-in for the vector index. `fail_set_payload_on_call`
/// makes the Nth `set_payload` call (1-based, counted across the
/// instance's lifetime) fail once, to simulate a mid-activation outage.
#[derive(Default)]
pub struct MemoryIndex {
    records: Mutex<Vec<Record>>,
    set_payload_calls: AtomicUsize,
    fail_set_payload_at: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_set_payload_on_call(&self, n: usize) {
        self.fail_set_payload_at.store(n, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn active_versions(&self, project_id: &str, doc_id: &str) -> HashSet<String> {
        self.snapshot()
            .iter()
            .filter(|r| {
                r.payload["project_id"] == project_id
                    && r.payload["doc_id"] == doc_id
                    && r.payload["is_active"] == true
            })
            .map(|r| r.payload["doc_version"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn versions(&self, project_id: &str, doc_id: &str) -> HashSet<String> {
        self.snapshot()
            .iter()
            .filter(|r| r.payload["project_id"] == project_id && r.payload["doc_id"] == doc_id)
            .map(|r| r.payload["doc_version"].as_str().unwrap().to_string())
            .collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        f64::from(dot / (na * nb))
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self, _name: &str, _dim: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _collection: &str, points: Vec<Point>) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        for point in points {
            records.retain(|r| r.id != point.id);
            records.push(Record {
                id: point.id,
                vector: point.vector,
                payload: point.payload,
            });
        }
        Ok(())
    }

    async fn set_payload(&self, _collection: &str, patch: Value, filter: &Filter) -> Result<()> {
        let call = self.set_payload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_set_payload_at.load(Ordering::SeqCst) {
            bail!("injected set_payload failure on call {}", call);
        }

        let mut records = self.records.lock().unwrap();
        let patch = patch.as_object().cloned().unwrap_or_default();
        for record in records.iter_mut() {
            if filter.matches(&record.payload) {
                for (k, v) in &patch {
                    record.payload[k] = v.clone();
                }
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        vector: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let records = self.records.lock().unwrap();
        let mut hits: Vec<ScoredPoint> = records
            .iter()
            .filter(|r| filter.matches(&r.payload))
            .map(|r| ScoredPoint {
                id: Value::String(r.id.clone()),
                score: cosine(vector, &r.vector),
                payload: r.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_by_filter(&self, _collection: &str, filter: &Filter) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| !filter.matches(&r.payload));
        Ok(())
    }
}

/// Chunking tuned small so short test documents still split.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.chunking.max_chars = 100;
    config.chunking.overlap = 10;
    config.chunking.min_chars = 10;
    config.chunking.hard_limit = 50;
    config
}

pub fn setup() -> (Arc<Gateway>, Arc<MemoryIndex>) {
    setup_with_config(test_config())
}

pub fn setup_with_config(config: Config) -> (Arc<Gateway>, Arc<MemoryIndex>) {
    let index = Arc::new(MemoryIndex::new());
    let embedder = Arc::new(DeterministicEmbedder::new(32));
    let gateway = Arc::new(Gateway::new(&config, embedder, index.clone()));
    (gateway, index)
}

pub fn ingest_request(project_id: &str, doc_id: &str, content: &str) -> IngestRequest {
    IngestRequest {
        project_id: project_id.to_string(),
        doc_id: doc_id.to_string(),
        title: "Title".to_string(),
        source: "test".to_string(),
        path_or_url: "kb://test".to_string(),
        content: content.to_string(),
        acl_public: true,
        acl_allow: Vec::new(),
    }
}

pub fn internal_search(query: &str, scope: &[&str]) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        project_scope: scope.iter().map(|s| s.to_string()).collect(),
        principal: Principal {
            kind: PrincipalType::InternalUser,
            id: "u1".to_string(),
            groups: Vec::new(),
        },
        top_k: 0,
    }
}

pub fn multi_paragraph_content(tag: &str) -> String {
    (0..6)
        .map(|i| format!("Paragraph {i} of the {tag} revision, padded with enough words to fill."))
        .collect::<Vec<_>>()
        .join("\n\n")
}
