//! Kind registry (component C): typed lookups wrapping a [`Closures`].

use super::closures::{build_closures, normalize_pair, Closures};
use crate::types::OntologyRelation;

#[derive(Debug, Clone)]
pub struct KindRegistry {
    closures: Closures,
}

impl KindRegistry {
    pub fn new(relations: &[OntologyRelation]) -> Self {
        Self {
            closures: build_closures(relations),
        }
    }

    pub fn closures(&self) -> &Closures {
        &self.closures
    }

    /// Strict: a kind is never a subclass of itself.
    pub fn is_sub_class_of(&self, child: &str, parent: &str) -> bool {
        self.closures
            .sub_class_ancestors
            .get(child)
            .map(|a| a.contains(parent))
            .unwrap_or(false)
    }

    /// Reflexive: every kind is assignable to itself.
    pub fn is_assignable_to(&self, concrete: &str, target: &str) -> bool {
        concrete == target || self.is_sub_class_of(concrete, target)
    }

    /// `[k, ...descendants]`.
    pub fn expand_sub_classes(&self, k: &str) -> Vec<String> {
        let mut out = vec![k.to_string()];
        if let Some(descendants) = self.closures.sub_class_descendants.get(k) {
            out.extend(descendants.iter().cloned());
        }
        out
    }

    pub fn is_narrower_than(&self, a: &str, b: &str) -> bool {
        self.closures
            .narrower_closure
            .get(a)
            .map(|s| s.contains(b))
            .unwrap_or(false)
    }

    pub fn is_broader_than(&self, a: &str, b: &str) -> bool {
        self.closures
            .broader_closure
            .get(b)
            .map(|s| s.contains(a))
            .unwrap_or(false)
    }

    pub fn are_equivalent(&self, a: &str, b: &str) -> bool {
        self.closures
            .equivalence_sets
            .get(a)
            .map(|s| s.contains(b))
            .unwrap_or(false)
    }

    /// Self-excluding by construction (see `build_closures`).
    pub fn get_equivalents(&self, k: &str) -> Vec<String> {
        self.closures
            .equivalence_sets
            .get(k)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn resolve_iri(&self, iri: &str) -> Option<&str> {
        self.closures.iri_to_kind.get(iri).map(|s| s.as_str())
    }

    /// Irreflexive and order-independent.
    pub fn are_disjoint(&self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        self.closures.disjoint_pairs.contains(&normalize_pair(a, b))
    }

    pub fn get_disjoint_kinds(&self, k: &str) -> Vec<String> {
        self.closures
            .disjoint_pairs
            .iter()
            .filter_map(|pair| {
                let (a, b) = pair.split_once('|')?;
                if a == k {
                    Some(b.to_string())
                } else if b == k {
                    Some(a.to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn is_part_of(&self, part: &str, whole: &str) -> bool {
        self.closures
            .part_of_closure
            .get(part)
            .map(|s| s.contains(whole))
            .unwrap_or(false)
    }

    pub fn get_parts(&self, whole: &str) -> Vec<String> {
        self.closures
            .has_part_closure
            .get(whole)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_wholes(&self, part: &str) -> Vec<String> {
        self.closures
            .part_of_closure
            .get(part)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// An involution when defined: `get_inverse_edge(get_inverse_edge(e)) == e`.
    pub fn get_inverse_edge(&self, edge: &str) -> Option<&str> {
        self.closures.edge_inverses.get(edge).map(|s| s.as_str())
    }

    pub fn get_implied_edges(&self, edge: &str) -> Vec<String> {
        self.closures
            .edge_implications_closure
            .get(edge)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_implying_edges(&self, edge: &str) -> Vec<String> {
        self.closures
            .edge_implying_closure
            .get(edge)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `[edge, ...implying]`.
    pub fn expand_implying_edges(&self, edge: &str) -> Vec<String> {
        let mut out = vec![edge.to_string()];
        out.extend(self.get_implying_edges(edge));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(meta: &str, from: &str, to: &str) -> OntologyRelation {
        OntologyRelation::new(meta, from, to)
    }

    #[test]
    fn self_assignable_even_without_relations() {
        let registry = KindRegistry::new(&[]);
        assert!(registry.is_assignable_to("Person", "Person"));
        assert!(!registry.is_sub_class_of("Person", "Person"));
    }

    #[test]
    fn assignable_to_is_reflexive_and_transitive() {
        let registry = KindRegistry::new(&[rel("subClassOf", "Dog", "Animal")]);
        assert!(registry.is_assignable_to("Dog", "Animal"));
        assert!(registry.is_assignable_to("Dog", "Dog"));
        assert!(!registry.is_assignable_to("Animal", "Dog"));
    }

    #[test]
    fn disjointness_irreflexive() {
        let registry = KindRegistry::new(&[rel("disjointWith", "Person", "Organization")]);
        assert!(!registry.are_disjoint("Person", "Person"));
        assert!(registry.are_disjoint("Person", "Organization"));
        assert!(registry.are_disjoint("Organization", "Person"));
    }

    #[test]
    fn inverse_edge_is_an_involution() {
        let registry = KindRegistry::new(&[rel("inverseOf", "manages", "managedBy")]);
        let once = registry.get_inverse_edge("manages").unwrap().to_string();
        let twice = registry.get_inverse_edge(&once).unwrap();
        assert_eq!(twice, "manages");
    }

    #[test]
    fn expand_implying_edges_includes_self() {
        let registry = KindRegistry::new(&[rel("implies", "managerOf", "worksWith")]);
        let expanded = registry.expand_implying_edges("worksWith");
        assert!(expanded.contains(&"worksWith".to_string()));
        assert!(expanded.contains(&"managerOf".to_string()));
    }
}
