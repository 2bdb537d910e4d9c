//! Vector index capability and its Qdrant implementation.
//!
//! The gateway only needs five operations from its index: idempotent
//! collection creation, batch upsert, conditional payload updates by
//! filter, filtered nearest-neighbor search, and delete-by-filter
//! (reserved for future retirement flows). [`VectorIndex`] captures that
//! contract so the coordinator can be exercised against an in-memory
//! index in tests while [`QdrantClient`] speaks the real HTTP API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::Filter;

/// One record to upsert: generated id, embedding vector, full chunk
/// payload.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// A scored record returned from a filtered search.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    pub score: f64,
    #[serde(default)]
    pub payload: Value,
}

/// Outbound contract to the vector index service.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist; "already exists" is
    /// success.
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()>;
    /// Write all points in one batch; existing ids are overwritten.
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()>;
    /// Apply `patch` to the payload of every record matching `filter`.
    async fn set_payload(&self, collection: &str, patch: Value, filter: &Filter) -> Result<()>;
    /// Filtered nearest-neighbor search, ranked by similarity score.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;
    /// Remove every record matching `filter`.
    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<()>;
}

/// Thin client for Qdrant's HTTP API.
pub struct QdrantClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct QdrantSearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

impl QdrantClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn call(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .request(method.clone(), &url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("qdrant {} {}", method, path))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("qdrant {} {} status {}: {}", method, path, status, text);
        }
        resp.json()
            .await
            .with_context(|| format!("qdrant {} {}: decode body", method, path))
    }
}

#[async_trait]
impl VectorIndex for QdrantClient {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()> {
        let body = serde_json::json!({
            "vectors": { "size": dim, "distance": "Cosine" }
        });
        let url = format!("{}/collections/{}", self.base_url, name);
        let resp = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .context("qdrant ensure collection")?;

        // 409 means the collection already exists, which is fine.
        let status = resp.status();
        if status.is_success() || status.as_u16() == 409 {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        bail!("qdrant ensure collection: status {}: {}", status, text);
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let body = serde_json::json!({ "points": points });
        self.call(
            Method::PUT,
            &format!("/collections/{}/points?wait=true", collection),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn set_payload(&self, collection: &str, patch: Value, filter: &Filter) -> Result<()> {
        let body = serde_json::json!({ "payload": patch, "filter": filter });
        self.call(
            Method::POST,
            &format!("/collections/{}/points/payload?wait=true", collection),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "filter": filter,
        });
        let raw = self
            .call(
                Method::POST,
                &format!("/collections/{}/points/search", collection),
                &body,
            )
            .await?;
        let parsed: QdrantSearchResponse =
            serde_json::from_value(raw).context("qdrant search: decode result")?;
        Ok(parsed.result)
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<()> {
        let body = serde_json::json!({ "filter": filter });
        self.call(
            Method::POST,
            &format!("/collections/{}/points/delete?wait=true", collection),
            &body,
        )
        .await?;
        Ok(())
    }
}
