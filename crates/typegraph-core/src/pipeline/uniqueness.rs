//! Uniqueness key computation (`spec.md` §4.F "Constraint prechecks").
//!
//! A constraint applies to a node write when its `predicate` (a conjunction
//! of `WherePredicate` clauses) matches the candidate props. Its key is the
//! null-byte-joined, collation-normalized values of its `fields`, in
//! declaration order, so two props objects collide iff every field collides.
//! A missing or null field contributes a null marker (also byte 0x00)
//! instead of its stringified value, so an absent field can never collide
//! with a node that legitimately stores the string `"null"`.

use crate::ontology::KindRegistry;
use crate::types::{Collation, GraphDefinition, UniquenessConstraint, UniquenessScope};

const FIELD_SEPARATOR: char = '\u{0}';
const NULL_MARKER: &str = "\u{0}";

fn normalize_field(value: Option<&serde_json::Value>, collation: Collation) -> String {
    match value {
        None | Some(serde_json::Value::Null) => NULL_MARKER.to_string(),
        Some(serde_json::Value::String(s)) => match collation {
            Collation::Binary => s.clone(),
            Collation::CaseInsensitive => s.to_lowercase(),
        },
        Some(other) => {
            let raw = other.to_string();
            match collation {
                Collation::Binary => raw,
                Collation::CaseInsensitive => raw.to_lowercase(),
            }
        }
    }
}

/// The key a candidate `props` object would occupy under `constraint`, or
/// `None` if the constraint's predicate does not apply to these props.
pub fn compute_key(constraint: &UniquenessConstraint, props: &serde_json::Value) -> Option<String> {
    if !constraint.applies(props) {
        return None;
    }
    let parts: Vec<String> = constraint
        .fields
        .iter()
        .map(|f| normalize_field(props.get(f), constraint.collation))
        .collect();
    Some(parts.join(&FIELD_SEPARATOR.to_string()))
}

/// One constraint as it applies to a concrete node kind: which kind's
/// uniqueness bucket the key is stored/checked under. `KindWithSubClasses`
/// constraints declared on an ancestor kind share a bucket across the whole
/// subtree, keyed at the declaring ancestor's name.
#[derive(Debug, Clone)]
pub struct ScopedConstraint {
    pub bucket_kind: String,
    pub constraint: UniquenessConstraint,
}

/// All constraints that apply when writing a node of `kind`: its own
/// constraints plus any ancestor's `KindWithSubClasses`-scoped constraints.
pub fn applicable_constraints(
    def: &GraphDefinition,
    registry: &KindRegistry,
    kind: &str,
) -> Vec<ScopedConstraint> {
    let mut out = Vec::new();
    if let Some(own) = def.nodes.get(kind) {
        for c in &own.unique_constraints {
            out.push(ScopedConstraint {
                bucket_kind: kind.to_string(),
                constraint: c.clone(),
            });
        }
    }
    for ancestor in registry.closures().sub_class_ancestors.get(kind).into_iter().flatten() {
        if let Some(ancestor_kind) = def.nodes.get(ancestor.as_str()) {
            for c in &ancestor_kind.unique_constraints {
                if c.scope == UniquenessScope::KindWithSubClasses {
                    out.push(ScopedConstraint {
                        bucket_kind: ancestor.clone(),
                        constraint: c.clone(),
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WherePredicate;
    use serde_json::json;

    #[test]
    fn binary_collation_is_case_sensitive() {
        let c = UniquenessConstraint::new("email", vec!["email".to_string()]);
        let a = compute_key(&c, &json!({"email": "A@x.com"}));
        let b = compute_key(&c, &json!({"email": "a@x.com"}));
        assert_ne!(a, b);
    }

    #[test]
    fn case_insensitive_collation_collides() {
        let c = UniquenessConstraint::new("email", vec!["email".to_string()])
            .with_collation(Collation::CaseInsensitive);
        let a = compute_key(&c, &json!({"email": "A@x.com"}));
        let b = compute_key(&c, &json!({"email": "a@x.com"}));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_field_does_not_collide_with_the_literal_string_null() {
        let c = UniquenessConstraint::new("nickname", vec!["nickname".to_string()]);
        let missing = compute_key(&c, &json!({}));
        let literal_null_string = compute_key(&c, &json!({"nickname": "null"}));
        assert_ne!(missing, literal_null_string);
    }

    #[test]
    fn null_field_and_missing_field_normalize_the_same() {
        let c = UniquenessConstraint::new("nickname", vec!["nickname".to_string()]);
        let missing = compute_key(&c, &json!({}));
        let explicit_null = compute_key(&c, &json!({"nickname": null}));
        assert_eq!(missing, explicit_null);
    }

    #[test]
    fn predicate_gates_applicability() {
        let c = UniquenessConstraint::new("email", vec!["email".to_string()])
            .with_predicate(vec![WherePredicate::is_not_null("email")]);
        assert!(compute_key(&c, &json!({"email": "a@x.com"})).is_some());
        assert!(compute_key(&c, &json!({})).is_none());
    }
}
