//! Ingest, activation, and search orchestration.
//!
//! The [`Gateway`] owns the per-document lock registry and drives the
//! versioned-document protocol: chunk, embed, upsert inactive, then
//! atomically cut the document over to the new version. Activation is the
//! only path that flips `is_active`, and it always runs under the
//! document's key lock.
//!
//! The two activation steps are individually idempotent but not atomic
//! with respect to readers: between deactivating the old version and
//! activating the new one, a search can briefly observe zero active
//! chunks for the document. A failure between the steps leaves the
//! document with no active version until `activate` is retried with the
//! same target; callers must retry activation, not re-ingest.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::chunk::{self, ChunkConfig};
use crate::config::Config;
use crate::embed::Embedder;
use crate::error::{GatewayError, IndexStep, Result};
use crate::filter;
use crate::index::{Point, VectorIndex};
use crate::lock::DocLocks;
use crate::models::{ChunkPayload, Principal, SearchHit};

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub project_id: String,
    pub doc_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub path_or_url: String,
    pub content: String,
    #[serde(default)]
    pub acl_public: bool,
    #[serde(default)]
    pub acl_allow: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub doc_version: String,
    pub chunks_written: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateRequest {
    pub project_id: String,
    pub doc_id: String,
    pub doc_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub project_scope: Vec<String>,
    pub principal: Principal,
    #[serde(default)]
    pub top_k: i64,
}

pub struct Gateway {
    collection: String,
    chunk_cfg: ChunkConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    doc_locks: Arc<DocLocks>,
}

impl Gateway {
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            collection: config.qdrant.collection.clone(),
            chunk_cfg: config.chunking.to_chunk_config(),
            embedder,
            index,
            doc_locks: Arc::new(DocLocks::new()),
        }
    }

    /// Create the backing collection if needed, sized to the embedder's
    /// dimension.
    pub async fn ensure_collection(&self) -> anyhow::Result<()> {
        self.index
            .ensure_collection(&self.collection, self.embedder.dim())
            .await
    }

    /// Ingest one document: mint a new version, chunk and embed the
    /// content, upsert the chunks inactive, then activate the version.
    ///
    /// On embedding failure nothing was written. On upsert failure
    /// nothing is active. On activation failure the new version's chunks
    /// are indexed but inert; retry [`Gateway::activate`] with the
    /// returned version rather than re-ingesting.
    pub async fn ingest(&self, req: IngestRequest) -> Result<IngestOutcome> {
        if req.project_id.is_empty() || req.doc_id.is_empty() || req.content.trim().is_empty() {
            return Err(GatewayError::missing_fields());
        }

        let _lock = self
            .doc_locks
            .lock(&format!("{}:{}", req.project_id, req.doc_id))
            .await;

        let (doc_version, doc_version_ts) = mint_version();

        let mut chunks = chunk::split(&self.chunk_cfg, &req.content);
        // Very short documents can fall under min_chars and produce no
        // chunks; index the trimmed content as a single chunk so every
        // non-empty document stays retrievable.
        if chunks.is_empty() {
            chunks.push(req.content.trim().to_string());
        }

        let vectors = self
            .embedder
            .embed(&chunks)
            .await
            .map_err(GatewayError::EmbeddingUnavailable)?;

        let points: Vec<Point> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| {
                let payload = ChunkPayload {
                    project_id: req.project_id.clone(),
                    doc_id: req.doc_id.clone(),
                    doc_version: doc_version.clone(),
                    doc_version_ts,
                    is_active: false,
                    chunk_id: i as i64,
                    source: req.source.clone(),
                    title: req.title.clone(),
                    path_or_url: req.path_or_url.clone(),
                    text: text.clone(),
                    content_hash: hash_text(text),
                    acl_public: req.acl_public,
                    acl_external_public: false,
                    acl_allow: req.acl_allow.clone(),
                    created_at: doc_version_ts,
                    updated_at: doc_version_ts,
                    deleted: false,
                };
                Point {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    payload: serde_json::to_value(&payload)
                        .expect("chunk payload serializes to JSON"),
                }
            })
            .collect();

        let chunks_written = points.len();
        self.index
            .upsert(&self.collection, points)
            .await
            .map_err(|e| GatewayError::index(IndexStep::Upsert, e))?;

        self.activate_locked(&req.project_id, &req.doc_id, &doc_version)
            .await?;

        Ok(IngestOutcome {
            doc_version,
            chunks_written,
        })
    }

    /// Make `doc_version` the sole active version of the document.
    ///
    /// Independently retriable: both steps are idempotent, so re-driving
    /// a stuck activation with the same version is always safe.
    pub async fn activate(&self, req: ActivateRequest) -> Result<()> {
        if req.project_id.is_empty() || req.doc_id.is_empty() || req.doc_version.is_empty() {
            return Err(GatewayError::missing_fields());
        }

        let _lock = self
            .doc_locks
            .lock(&format!("{}:{}", req.project_id, req.doc_id))
            .await;

        self.activate_locked(&req.project_id, &req.doc_id, &req.doc_version)
            .await
    }

    /// Two-step cutover, caller must hold the document lock.
    async fn activate_locked(
        &self,
        project_id: &str,
        doc_id: &str,
        doc_version: &str,
    ) -> Result<()> {
        use crate::filter::{Condition, Filter};

        let deactivate = Filter::must(vec![
            Condition::value("project_id", project_id),
            Condition::value("doc_id", doc_id),
            Condition::value("is_active", true),
        ]);
        self.index
            .set_payload(
                &self.collection,
                serde_json::json!({ "is_active": false }),
                &deactivate,
            )
            .await
            .map_err(|e| GatewayError::index(IndexStep::Activate, e))?;

        let activate = Filter::must(vec![
            Condition::value("project_id", project_id),
            Condition::value("doc_id", doc_id),
            Condition::value("doc_version", doc_version),
        ]);
        self.index
            .set_payload(
                &self.collection,
                serde_json::json!({ "is_active": true, "updated_at": Utc::now().timestamp() }),
                &activate,
            )
            .await
            .map_err(|e| GatewayError::index(IndexStep::Activate, e))
    }

    /// Embed the query and run one filtered nearest-neighbor search,
    /// scoped to the caller's projects and constrained by the compiled
    /// ACL predicate.
    pub async fn search(&self, req: SearchRequest) -> Result<Vec<SearchHit>> {
        if req.query.trim().is_empty() || req.project_scope.is_empty() {
            return Err(GatewayError::missing_fields());
        }
        let limit = if req.top_k > 0 { req.top_k as usize } else { 10 };

        let vectors = self
            .embedder
            .embed(std::slice::from_ref(&req.query))
            .await
            .map_err(GatewayError::EmbeddingUnavailable)?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| {
                GatewayError::EmbeddingUnavailable(anyhow::anyhow!("empty embedding response"))
            })?;

        let predicate = filter::and(
            filter::base_filter(&req.project_scope),
            filter::acl_filter(&req.principal),
        );

        let hits = self
            .index
            .search(&self.collection, &query_vector, &predicate, limit)
            .await
            .map_err(|e| GatewayError::index(IndexStep::Search, e))?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchHit {
                text: payload_str(&hit.payload, "text"),
                score: hit.score,
                project_id: payload_str(&hit.payload, "project_id"),
                doc_id: payload_str(&hit.payload, "doc_id"),
                doc_version: payload_str(&hit.payload, "doc_version"),
                chunk_id: payload_i64(&hit.payload, "chunk_id"),
                title: payload_str(&hit.payload, "title"),
                path_or_url: payload_str(&hit.payload, "path_or_url"),
            })
            .collect())
    }
}

/// Instant of the most recently minted version, in Unix nanoseconds.
/// Guards monotonicity when two ingests land on the same clock reading.
static LAST_VERSION_NANOS: AtomicI64 = AtomicI64::new(0);

/// Mint a version token: a human-inspectable UTC timestamp string plus
/// its Unix-epoch second form. Tokens are strictly increasing across the
/// process, so re-ingesting the same document always yields a new,
/// totally ordered version.
fn mint_version() -> (String, i64) {
    let now_nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);
    let mut prev = LAST_VERSION_NANOS.load(Ordering::SeqCst);
    let nanos = loop {
        let candidate = now_nanos.max(prev + 1);
        match LAST_VERSION_NANOS.compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => break candidate,
            Err(observed) => prev = observed,
        }
    };

    let minted: DateTime<Utc> = DateTime::from_timestamp_nanos(nanos);
    let doc_version = minted.format("%Y%m%dT%H%M%S%.9fZ").to_string();
    (doc_version, minted.timestamp())
}

fn hash_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// String payload field, empty on absence or type mismatch.
fn payload_str(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Integer payload field, tolerating the numeric encodings the index may
/// hand back (integer, float, or numeric string). Defaults to zero
/// rather than failing the request.
fn payload_i64(payload: &Value, key: &str) -> i64 {
    match payload.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
