//! Ontology closure builder (component B).
//!
//! Compiles a flat list of [`OntologyRelation`]s into the twelve
//! mappings/sets of `Closures`, paying an up-front O(N^3) Warshall pass so
//! that query-time lookups (component C) are O(1). Ontologies are small
//! (10^2-10^3 named entities) so the asymptotics are fine; see `spec.md`
//! §9 "Closures precomputed, not resolved at runtime".

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{MetaEdgeName, OntologyRelation, RelationEndpoint};

/// Normalize a disjointness pair so lookups are order-independent: the
/// lexically smaller name comes first, joined with `|`.
pub fn normalize_pair(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Closures {
    pub sub_class_ancestors: HashMap<String, HashSet<String>>,
    pub sub_class_descendants: HashMap<String, HashSet<String>>,
    pub broader_closure: HashMap<String, HashSet<String>>,
    pub narrower_closure: HashMap<String, HashSet<String>>,
    pub equivalence_sets: HashMap<String, HashSet<String>>,
    pub iri_to_kind: HashMap<String, String>,
    pub disjoint_pairs: HashSet<String>,
    pub part_of_closure: HashMap<String, HashSet<String>>,
    pub has_part_closure: HashMap<String, HashSet<String>>,
    pub edge_inverses: HashMap<String, String>,
    pub edge_implications_closure: HashMap<String, HashSet<String>>,
    pub edge_implying_closure: HashMap<String, HashSet<String>>,
}

/// Transitive closure of a directed-edge set via repeated-squaring Warshall:
/// for every intermediate k, if i reaches k and k reaches j then i reaches j.
fn warshall_closure(direct: &HashMap<String, HashSet<String>>) -> HashMap<String, HashSet<String>> {
    let nodes: HashSet<String> = direct
        .iter()
        .flat_map(|(k, vs)| std::iter::once(k.clone()).chain(vs.iter().cloned()))
        .collect();
    let mut reach: HashMap<String, HashSet<String>> = HashMap::new();
    for n in &nodes {
        reach.insert(n.clone(), direct.get(n).cloned().unwrap_or_default());
    }
    for k in &nodes {
        // Snapshot reach(k) before this iteration mutates other rows through k.
        let reach_k = reach.get(k).cloned().unwrap_or_default();
        for i in &nodes {
            let reaches_k = reach.get(i).map(|s| s.contains(k)).unwrap_or(false);
            if reaches_k {
                let entry = reach.entry(i.clone()).or_default();
                for j in &reach_k {
                    entry.insert(j.clone());
                }
            }
        }
    }
    reach
}

fn invert(direct: &HashMap<String, HashSet<String>>) -> HashMap<String, HashSet<String>> {
    let mut inv: HashMap<String, HashSet<String>> = HashMap::new();
    for (k, vs) in direct {
        inv.entry(k.clone()).or_default();
        for v in vs {
            inv.entry(v.clone()).or_default().insert(k.clone());
        }
    }
    inv
}

/// Union-find with path compression, used to build equivalence classes for
/// `equivalentTo`/`sameAs`.
struct UnionFind {
    parent: HashMap<String, String>,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: HashMap::new(),
        }
    }

    fn find(&mut self, x: &str) -> String {
        if !self.parent.contains_key(x) {
            self.parent.insert(x.to_string(), x.to_string());
            return x.to_string();
        }
        let p = self.parent.get(x).unwrap().clone();
        if p == x {
            return p;
        }
        let root = self.find(&p);
        self.parent.insert(x.to_string(), root.clone());
        root
    }

    fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

pub fn build_closures(relations: &[OntologyRelation]) -> Closures {
    let mut sub_class_direct: HashMap<String, HashSet<String>> = HashMap::new();
    let mut broader_direct: HashMap<String, HashSet<String>> = HashMap::new();
    let mut part_of_direct: HashMap<String, HashSet<String>> = HashMap::new();
    let mut implies_direct: HashMap<String, HashSet<String>> = HashMap::new();
    let mut disjoint_pairs = HashSet::new();
    let mut edge_inverses = HashMap::new();
    let mut iri_to_kind = HashMap::new();
    let mut uf = UnionFind::new();
    let mut equivalence_members: HashSet<String> = HashSet::new();

    for rel in relations {
        let from = rel.from.as_str().to_string();
        let to = rel.to.as_str().to_string();

        match rel.from {
            RelationEndpoint::Iri(_) => {
                iri_to_kind.insert(from.clone(), to.clone());
            }
            _ => {}
        }
        match rel.to {
            RelationEndpoint::Iri(_) => {
                iri_to_kind.insert(to.clone(), from.clone());
            }
            _ => {}
        }

        match rel.meta_edge.0.as_str() {
            "subClassOf" => {
                sub_class_direct.entry(from.clone()).or_default().insert(to.clone());
            }
            "broader" => {
                broader_direct.entry(from.clone()).or_default().insert(to.clone());
            }
            "narrower" => {
                // narrower(A, B) means A is narrower than B, i.e. B is
                // broader than A: insert the inverse pair into broader.
                broader_direct.entry(to.clone()).or_default().insert(from.clone());
            }
            "partOf" => {
                part_of_direct.entry(from.clone()).or_default().insert(to.clone());
            }
            "hasPart" => {
                // hasPart(A, B) means A has-part B, i.e. B is part-of A.
                part_of_direct.entry(to.clone()).or_default().insert(from.clone());
            }
            "implies" => {
                implies_direct.entry(from.clone()).or_default().insert(to.clone());
            }
            "equivalentTo" | "sameAs" => {
                uf.union(&from, &to);
                equivalence_members.insert(from.clone());
                equivalence_members.insert(to.clone());
            }
            "disjointWith" => {
                disjoint_pairs.insert(normalize_pair(&from, &to));
            }
            "inverseOf" => {
                edge_inverses.insert(from.clone(), to.clone());
                edge_inverses.insert(to, from);
            }
            _ => {
                // Custom meta-edges with no precomputed closure slot are
                // still legal to declare; they simply carry no derived
                // reasoning beyond their own declared relation.
            }
        }
    }

    let sub_class_ancestors = warshall_closure(&sub_class_direct);
    let sub_class_descendants = invert(&sub_class_ancestors);
    let broader_closure = warshall_closure(&broader_direct);
    let narrower_closure = invert(&broader_closure);
    let part_of_closure = warshall_closure(&part_of_direct);
    let has_part_closure = invert(&part_of_closure);
    let edge_implications_closure = warshall_closure(&implies_direct);
    let edge_implying_closure = invert(&edge_implications_closure);

    let mut equivalence_sets: HashMap<String, HashSet<String>> = HashMap::new();
    let mut classes: HashMap<String, HashSet<String>> = HashMap::new();
    for m in &equivalence_members {
        let root = uf.find(m);
        classes.entry(root).or_default().insert(m.clone());
    }
    for members in classes.values() {
        for m in members {
            let mut others = members.clone();
            others.remove(m);
            equivalence_sets.insert(m.clone(), others);
        }
    }

    Closures {
        sub_class_ancestors,
        sub_class_descendants,
        broader_closure,
        narrower_closure,
        equivalence_sets,
        iri_to_kind,
        disjoint_pairs,
        part_of_closure,
        has_part_closure,
        edge_inverses,
        edge_implications_closure,
        edge_implying_closure,
    }
}

/// Normalized triple-key comparison helper reused by the schema differ
/// (component D) to compare ontology relation sets across versions.
pub fn relation_triple_keys(relations: &[OntologyRelation]) -> BTreeMap<String, ()> {
    relations.iter().map(|r| (r.triple_key(), ())).collect()
}

/// Silence unused-import warnings for MetaEdgeName when only used in doc
/// comments on some configurations.
#[allow(unused_imports)]
use MetaEdgeName as _MetaEdgeNameReexport;

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(meta: &str, from: &str, to: &str) -> OntologyRelation {
        OntologyRelation::new(meta, from, to)
    }

    #[test]
    fn subsumption_is_transitive() {
        let relations = vec![rel("subClassOf", "Dog", "Mammal"), rel("subClassOf", "Mammal", "Animal")];
        let closures = build_closures(&relations);
        assert!(closures.sub_class_ancestors["Dog"].contains("Animal"));
        assert!(closures.sub_class_descendants["Animal"].contains("Dog"));
    }

    #[test]
    fn ancestors_and_descendants_are_inverses() {
        let relations = vec![rel("subClassOf", "A", "B"), rel("subClassOf", "B", "C")];
        let closures = build_closures(&relations);
        for (k, ancestors) in &closures.sub_class_ancestors {
            for a in ancestors {
                assert!(closures.sub_class_descendants.get(a).map(|d| d.contains(k)).unwrap_or(false));
            }
        }
    }

    #[test]
    fn equivalence_is_symmetric_transitive_and_self_excluding() {
        let relations = vec![rel("equivalentTo", "A", "B"), rel("equivalentTo", "B", "C")];
        let closures = build_closures(&relations);
        assert!(closures.equivalence_sets["A"].contains("C"));
        assert!(closures.equivalence_sets["C"].contains("A"));
        assert!(!closures.equivalence_sets["A"].contains("A"));
    }

    #[test]
    fn disjointness_is_order_independent() {
        let relations = vec![rel("disjointWith", "Person", "Organization")];
        let closures = build_closures(&relations);
        assert!(closures.disjoint_pairs.contains(&normalize_pair("Organization", "Person")));
    }

    #[test]
    fn inverse_of_is_stored_symmetrically() {
        let relations = vec![rel("inverseOf", "manages", "managedBy")];
        let closures = build_closures(&relations);
        assert_eq!(closures.edge_inverses["manages"], "managedBy");
        assert_eq!(closures.edge_inverses["managedBy"], "manages");
    }

    #[test]
    fn narrower_feeds_broader_closure() {
        let relations = vec![rel("narrower", "Cat", "Animal")];
        let closures = build_closures(&relations);
        assert!(closures.broader_closure["Cat"].contains("Animal"));
        assert!(closures.narrower_closure["Animal"].contains("Cat"));
    }

    #[test]
    fn has_part_feeds_part_of_closure() {
        let relations = vec![rel("hasPart", "Car", "Engine")];
        let closures = build_closures(&relations);
        assert!(closures.part_of_closure["Engine"].contains("Car"));
        assert!(closures.has_part_closure["Car"].contains("Engine"));
    }

    #[test]
    fn order_independence_permutation_invariant() {
        let r1 = vec![rel("subClassOf", "A", "B"), rel("subClassOf", "B", "C")];
        let r2 = vec![rel("subClassOf", "B", "C"), rel("subClassOf", "A", "B")];
        let c1 = build_closures(&r1);
        let c2 = build_closures(&r2);
        assert_eq!(c1.sub_class_ancestors, c2.sub_class_ancestors);
    }

    #[test]
    fn duplicate_relations_are_idempotent() {
        let r1 = vec![rel("subClassOf", "A", "B")];
        let r2 = vec![rel("subClassOf", "A", "B"), rel("subClassOf", "A", "B")];
        let c1 = build_closures(&r1);
        let c2 = build_closures(&r2);
        assert_eq!(c1.sub_class_ancestors, c2.sub_class_ancestors);
    }

    #[test]
    fn iri_mapping_extracts_single_sided_pairs() {
        let relations = vec![rel("sameAs", "Person", "https://schema.org/Person")];
        let closures = build_closures(&relations);
        assert_eq!(
            closures.iri_to_kind.get("https://schema.org/Person").map(|s| s.as_str()),
            Some("Person")
        );
    }
}
