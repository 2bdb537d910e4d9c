//! Per-document access control.
//!
//! A document's ACL is attached to every chunk at ingest time. Visibility
//! is decided by principal type: customer principals only ever see
//! externally-public content or content shared with one of their groups;
//! internal users and services see internally-public content or group
//! shares. Internal-public content must never be visible to customers.

use serde::{Deserialize, Serialize};

use crate::models::{Principal, PrincipalType};

/// ACL attached to a document (and inherited by all of its chunks).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocAcl {
    #[serde(rename = "acl_public")]
    pub public: bool,
    #[serde(rename = "acl_external_public")]
    pub external_public: bool,
    #[serde(rename = "acl_allow", default)]
    pub allow: Vec<String>,
}

/// Direct visibility check for one principal against one document ACL.
///
/// This is the reference semantics that [`crate::filter::acl_filter`]
/// compiles into a retrieval-time predicate.
pub fn allowed(principal: &Principal, acl: &DocAcl) -> bool {
    match principal.kind {
        PrincipalType::CustomerUser => {
            // Customer visibility never uses internal-public.
            acl.external_public || intersects(&acl.allow, &principal.groups)
        }
        PrincipalType::InternalUser | PrincipalType::Service => {
            acl.public || intersects(&acl.allow, &principal.groups)
        }
    }
}

fn intersects(a: &[String], b: &[String]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    b.iter().any(|y| a.contains(y))
}
