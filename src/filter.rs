//! Retrieval-time predicate compiler.
//!
//! Filters are small tagged trees with two clause kinds: `must`
//! (conjunctive) and `should` (disjunctive, at least one holds). They
//! serialize directly into Qdrant's filter JSON and can also be evaluated
//! in process against a payload, which is what the in-memory index used
//! by the integration tests does.
//!
//! This module is the sole authority for what a principal can see at
//! search time. A missing `deleted = false` clause or a wrongly merged
//! disjunction silently widens visibility, so changes here need matching
//! updates to the tests asserting the compiled shapes.

use serde::Serialize;
use serde_json::Value;

use crate::models::{Principal, PrincipalType};

/// How a single condition matches a payload field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Match {
    /// Field equals this exact value.
    Value(Value),
    /// Field (scalar or array) intersects this set of keywords.
    Any(Vec<String>),
}

/// One field predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub key: String,
    #[serde(rename = "match")]
    pub matcher: Match,
}

impl Condition {
    pub fn value(key: &str, value: impl Into<Value>) -> Self {
        Self {
            key: key.to_string(),
            matcher: Match::Value(value.into()),
        }
    }

    pub fn any(key: &str, values: &[String]) -> Self {
        Self {
            key: key.to_string(),
            matcher: Match::Any(values.to_vec()),
        }
    }
}

/// A compiled predicate: conjunction over `must`, and when `should` is
/// non-empty, at least one of its conditions as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Condition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Condition>,
}

impl Filter {
    pub fn must(conditions: Vec<Condition>) -> Self {
        Self {
            must: conditions,
            should: Vec::new(),
        }
    }

    pub fn should(conditions: Vec<Condition>) -> Self {
        Self {
            must: Vec::new(),
            should: conditions,
        }
    }

    /// Evaluate this filter against a JSON payload object.
    pub fn matches(&self, payload: &Value) -> bool {
        if !self.must.iter().all(|c| c.matches(payload)) {
            return false;
        }
        if !self.should.is_empty() && !self.should.iter().any(|c| c.matches(payload)) {
            return false;
        }
        true
    }
}

impl Condition {
    fn matches(&self, payload: &Value) -> bool {
        let field = match payload.get(&self.key) {
            Some(v) => v,
            None => return false,
        };
        match &self.matcher {
            Match::Value(expected) => field == expected,
            Match::Any(set) => match field {
                Value::String(s) => set.iter().any(|v| v == s),
                Value::Array(items) => items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .any(|s| set.iter().any(|v| v == s)),
                _ => false,
            },
        }
    }
}

/// Predicate every search carries regardless of principal: project scope,
/// active version only, not retired.
pub fn base_filter(project_scope: &[String]) -> Filter {
    Filter::must(vec![
        Condition::any("project_id", project_scope),
        Condition::value("is_active", true),
        Condition::value("deleted", false),
    ])
}

/// Compile a principal into its visibility disjunction.
///
/// Customers get the external-public disjunct, everyone else the
/// internal-public one; a group-intersection disjunct is added only when
/// the principal actually carries groups. Customers must never receive an
/// `acl_public` clause.
pub fn acl_filter(principal: &Principal) -> Filter {
    let mut should = Vec::new();
    match principal.kind {
        PrincipalType::CustomerUser => {
            should.push(Condition::value("acl_external_public", true));
        }
        PrincipalType::InternalUser | PrincipalType::Service => {
            should.push(Condition::value("acl_public", true));
        }
    }
    if !principal.groups.is_empty() {
        should.push(Condition::any("acl_allow", &principal.groups));
    }
    Filter::should(should)
}

/// Conjunction of two filters: `must` lists and `should` lists are
/// concatenated independently. Only one input ever carries a `should`
/// clause in this system, so the disjunctions never merge incorrectly.
pub fn and(a: Filter, b: Filter) -> Filter {
    let mut out = a;
    out.must.extend(b.must);
    out.should.extend(b.should);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(kind: PrincipalType, groups: &[&str]) -> Principal {
        Principal {
            kind,
            id: "u1".to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn customer_filter_never_references_internal_public() {
        let f = acl_filter(&principal(PrincipalType::CustomerUser, &["customer:acme"]));
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("acl_public\""), "leaked acl_public: {json}");
        assert!(json.contains("acl_external_public"), "missing clause: {json}");
    }

    #[test]
    fn internal_without_groups_gets_exactly_public_clause() {
        let f = acl_filter(&principal(PrincipalType::InternalUser, &[]));
        assert_eq!(f.should, vec![Condition::value("acl_public", true)]);
        assert!(f.must.is_empty());
    }

    #[test]
    fn groups_add_allow_disjunct() {
        let f = acl_filter(&principal(PrincipalType::Service, &["team:x"]));
        assert_eq!(f.should.len(), 2);
        assert_eq!(f.should[1], Condition::any("acl_allow", &["team:x".to_string()]));
    }

    #[test]
    fn base_filter_requires_active_and_not_deleted() {
        let f = base_filter(&["p1".to_string()]);
        assert_eq!(
            f.must,
            vec![
                Condition::any("project_id", &["p1".to_string()]),
                Condition::value("is_active", true),
                Condition::value("deleted", false),
            ]
        );
    }

    #[test]
    fn and_concatenates_clause_lists_independently() {
        let combined = and(
            base_filter(&["p1".to_string()]),
            acl_filter(&principal(PrincipalType::InternalUser, &["g1"])),
        );
        assert_eq!(combined.must.len(), 3);
        assert_eq!(combined.should.len(), 2);
    }

    #[test]
    fn serializes_to_qdrant_shape() {
        let f = Filter::must(vec![Condition::value("doc_id", "d1")]);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "must": [{"key": "doc_id", "match": {"value": "d1"}}]
            })
        );

        let f = Filter::should(vec![Condition::any("acl_allow", &["g1".to_string()])]);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "should": [{"key": "acl_allow", "match": {"any": ["g1"]}}]
            })
        );
    }

    #[test]
    fn matches_conjunction_and_disjunction() {
        let payload = serde_json::json!({
            "project_id": "p1",
            "is_active": true,
            "deleted": false,
            "acl_public": false,
            "acl_external_public": false,
            "acl_allow": ["customer:acme"],
        });

        let f = and(
            base_filter(&["p1".to_string()]),
            acl_filter(&principal(PrincipalType::CustomerUser, &["customer:acme"])),
        );
        assert!(f.matches(&payload));

        // Same document, customer without the matching group: denied,
        // even though the document is internally public.
        let f = and(
            base_filter(&["p1".to_string()]),
            acl_filter(&principal(PrincipalType::CustomerUser, &["customer:other"])),
        );
        let mut public_payload = payload.clone();
        public_payload["acl_public"] = serde_json::json!(true);
        assert!(!f.matches(&public_payload));
    }

    #[test]
    fn matches_rejects_inactive_and_deleted() {
        let f = base_filter(&["p1".to_string()]);
        let active = serde_json::json!({"project_id": "p1", "is_active": true, "deleted": false});
        let inactive = serde_json::json!({"project_id": "p1", "is_active": false, "deleted": false});
        let deleted = serde_json::json!({"project_id": "p1", "is_active": true, "deleted": true});
        assert!(f.matches(&active));
        assert!(!f.matches(&inactive));
        assert!(!f.matches(&deleted));
    }
}
