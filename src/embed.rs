//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete backends:
//! - **[`OpenAiEmbedder`]** — the official OpenAI `/v1/embeddings` API.
//! - **[`OllamaEmbedder`]** — a local Ollama instance, one request per input.
//! - **[`CompatibleEmbedder`]** — any OpenAI-compatible endpoint (vLLM, LocalAI, ...).
//! - **[`DeterministicEmbedder`]** — hash-derived vectors for development
//!   and tests. Never a silent fallback: it must be selected explicitly
//!   in config and announces itself with a warning at startup.
//!
//! The gateway performs no retries here; a failed call surfaces as
//! `EmbeddingUnavailable` and the caller decides whether to retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;

/// Batch text-to-vector capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input, in input
    /// order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Vector dimensionality this embedder produces.
    fn dim(&self) -> usize;
}

/// Instantiate the embedder selected by configuration.
///
/// `provider = "openai"` without `OPENAI_API_KEY` in the environment is a
/// startup error, not a fallback to the deterministic embedder.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("embedding provider 'openai' requires OPENAI_API_KEY to be set")?;
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                config.model.clone(),
                config.dim,
                config.timeout_secs,
            )?))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            config.ollama_url.clone(),
            config.model.clone(),
            config.dim,
            config.timeout_secs,
        )?)),
        "openai-compatible" => Ok(Arc::new(CompatibleEmbedder::new(
            config.compatible_url.clone(),
            config.model.clone(),
            config.dim,
            config.timeout_secs,
        )?)),
        "deterministic" => {
            tracing::warn!(
                dim = config.dim,
                "using deterministic hash embedder; development only, do not use in production"
            );
            Ok(Arc::new(DeterministicEmbedder::new(config.dim)))
        }
        other => bail!(
            "unknown embedding provider: '{}' (supported: openai, ollama, openai-compatible, deterministic)",
            other
        ),
    }
}

// ============ OpenAI wire shapes ============

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbedding>,
    error: Option<OpenAiError>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiError {
    message: String,
}

// ============ OpenAI ============

/// Calls the official OpenAI `/v1/embeddings` endpoint with one batched
/// request per call.
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    dim: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, dim: usize, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            api_key,
            model,
            dim,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&OpenAiEmbedRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .context("openai embed: request")?;

        parse_openai_style(resp, texts.len(), "openai embed").await
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

// ============ Ollama ============

/// Calls a local Ollama instance. The Ollama embeddings API takes a
/// single prompt, so batches are sent as sequential requests.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dim: usize,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embedding: Vec<f32>,
    #[serde(default)]
    error: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String, dim: usize, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dim,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let resp = self
                .client
                .post(&url)
                .json(&OllamaEmbedRequest {
                    model: &self.model,
                    prompt: text,
                })
                .send()
                .await
                .context("ollama embed: request")?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                bail!("ollama embed: status {}: {}", status, body);
            }
            let parsed: OllamaEmbedResponse =
                resp.json().await.context("ollama embed: decode body")?;
            if !parsed.error.is_empty() {
                bail!("ollama embed: api error: {}", parsed.error);
            }
            out.push(parsed.embedding);
        }
        Ok(out)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

// ============ OpenAI-compatible ============

/// Calls any OpenAI-compatible `/embeddings` endpoint, typically a local
/// vLLM or LocalAI deployment. No authentication header is sent.
pub struct CompatibleEmbedder {
    base_url: String,
    model: String,
    dim: usize,
    client: reqwest::Client,
}

impl CompatibleEmbedder {
    pub fn new(base_url: String, model: String, dim: usize, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dim,
            client,
        })
    }
}

#[async_trait]
impl Embedder for CompatibleEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&OpenAiEmbedRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .context("compatible embed: request")?;

        parse_openai_style(resp, texts.len(), "compatible embed").await
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

async fn parse_openai_style(
    resp: reqwest::Response,
    expected: usize,
    label: &str,
) -> Result<Vec<Vec<f32>>> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{}: status {}: {}", label, status, body);
    }

    let parsed: OpenAiEmbedResponse = resp.json().await.with_context(|| format!("{}: decode body", label))?;
    if let Some(err) = parsed.error {
        bail!("{}: api error: {}", label, err.message);
    }
    if parsed.data.len() != expected {
        bail!(
            "{}: expected {} embeddings, got {}",
            label,
            expected,
            parsed.data.len()
        );
    }
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

// ============ Deterministic (dev/test) ============

/// Hash-derived embedder with a fixed dimension. The same text always
/// produces the same vector, which keeps local development and the
/// integration tests independent of any embedding service.
pub struct DeterministicEmbedder {
    dim: usize,
}

impl DeterministicEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let out = texts
            .iter()
            .map(|text| {
                let digest = Sha256::digest(text.as_bytes());
                (0..self.dim)
                    .map(|i| {
                        let off = (i * 2) % digest.len();
                        let word = u16::from_le_bytes([digest[off], digest[off + 1]]);
                        (i64::from(word) % 2000 - 1000) as f32 / 1000.0
                    })
                    .collect()
            })
            .collect();
        Ok(out)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
