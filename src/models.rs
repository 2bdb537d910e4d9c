//! Core data models used throughout the gateway.
//!
//! These types represent the principals, chunk payloads, and search results
//! that flow through the ingestion and retrieval pipeline. Field names on
//! serialized types are part of the index payload contract and must not
//! change without a reindex.

use serde::{Deserialize, Serialize};

/// Who a search is performed on behalf of. Supplied by the caller on every
/// request; the gateway interprets it but never authenticates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "type")]
    pub kind: PrincipalType,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Principal category, which decides which "public" ACL clause applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    InternalUser,
    CustomerUser,
    Service,
}

/// Payload stored alongside each chunk's vector in the index.
///
/// One record per chunk; a document's state is derived from the set of
/// records sharing `(project_id, doc_id)`. At rest, at most one version
/// of a document has `is_active = true` chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub project_id: String,
    pub doc_id: String,
    pub doc_version: String,
    pub doc_version_ts: i64,
    pub is_active: bool,
    pub chunk_id: i64,
    pub source: String,
    pub title: String,
    pub path_or_url: String,
    pub text: String,
    pub content_hash: String,
    pub acl_public: bool,
    pub acl_external_public: bool,
    pub acl_allow: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

/// A ranked search result mapped back out of the index payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f64,
    pub project_id: String,
    pub doc_id: String,
    pub doc_version: String,
    pub chunk_id: i64,
    pub title: String,
    pub path_or_url: String,
}
