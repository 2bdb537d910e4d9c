//! # kb-gateway
//!
//! An access-controlled retrieval gateway over a vector index.
//!
//! Documents are ingested as versioned sets of chunks: content is split
//! into bounded, overlapping segments, embedded in one batch, upserted
//! inactive, and then atomically cut over so exactly one version of each
//! document is searchable. Search embeds the query and runs one filtered
//! nearest-neighbor lookup whose predicate combines project scope with
//! the requesting principal's compiled ACL.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌───────────────────────────┐   ┌─────────┐
//! │  HTTP  │──▶│  Gateway                  │──▶│ Qdrant  │
//! │ (axum) │   │ chunk → embed → activate  │   │ (HTTP)  │
//! └────────┘   └─────────────┬─────────────┘   └─────────┘
//!                            │
//!                            ▼
//!                   ┌─────────────────┐
//!                   │ Embedding API   │
//!                   │ OpenAI / Ollama │
//!                   └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Deterministic text chunking |
//! | [`acl`] | Per-document access control |
//! | [`filter`] | Retrieval predicate compiler |
//! | [`lock`] | Per-document lock registry |
//! | [`embed`] | Embedding provider abstraction |
//! | [`index`] | Vector index client |
//! | [`gateway`] | Ingest/activate/search orchestration |
//! | [`error`] | Error taxonomy |
//! | [`server`] | HTTP surface |

pub mod acl;
pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod index;
pub mod lock;
pub mod models;
pub mod server;
