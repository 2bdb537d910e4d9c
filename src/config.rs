use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::chunk::ChunkConfig;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_qdrant_timeout")]
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            timeout_secs: default_qdrant_timeout(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "kb_chunks".to_string()
}
fn default_qdrant_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of: openai, ollama, openai-compatible, deterministic.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_compatible_url")]
    pub compatible_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dim: default_dim(),
            timeout_secs: default_embed_timeout(),
            ollama_url: default_ollama_url(),
            compatible_url: default_compatible_url(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dim() -> usize {
    1536
}
fn default_embed_timeout() -> u64 {
    10
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_compatible_url() -> String {
    "http://localhost:8000/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_hard_limit")]
    pub hard_limit: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap: default_overlap(),
            min_chars: default_min_chars(),
            hard_limit: default_hard_limit(),
        }
    }
}

fn default_max_chars() -> usize {
    1200
}
fn default_overlap() -> usize {
    200
}
fn default_min_chars() -> usize {
    200
}
fn default_hard_limit() -> usize {
    200
}

impl ChunkingConfig {
    pub fn to_chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            max_chars: self.max_chars,
            overlap: self.overlap,
            min_chars: self.min_chars,
            hard_limit: self.hard_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

fn default_max_content_bytes() -> usize {
    5 * 1024 * 1024
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap must be < chunking.max_chars");
    }

    if config.embedding.dim == 0 {
        anyhow::bail!("embedding.dim must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" | "ollama" | "openai-compatible" | "deterministic" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, openai-compatible, or deterministic.",
            other
        ),
    }

    if config.limits.max_content_bytes == 0 {
        anyhow::bail!("limits.max_content_bytes must be > 0");
    }
    Ok(())
}
