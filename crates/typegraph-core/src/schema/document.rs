//! Schema serializer (component D, part 1): the canonical JSON document.
//!
//! Canonicalization relies on `serde_json::Map` being `BTreeMap`-backed by
//! default in this workspace (the `preserve_order` feature is not enabled),
//! so any `serde_json::Value` produced here already serializes with sorted
//! object keys. Set-valued fields (closures, endpoint kind sets) are stored
//! as `BTreeSet`/`BTreeMap` explicitly so their *contents* are deterministic
//! too, not just the key order of the wrapping object.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ontology::Closures;
use crate::types::{
    Cardinality, DeleteBehavior, EndpointExistence, GraphDefaults, GraphDefinition, MetaEdge,
    OntologyRelation, UniquenessConstraint,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDoc {
    pub name: String,
    pub properties: serde_json::Value,
    pub property_names: BTreeSet<String>,
    pub required_properties: BTreeSet<String>,
    pub unique_constraints: Vec<UniquenessConstraint>,
    pub on_delete: DeleteBehavior,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDoc {
    pub name: String,
    pub properties: serde_json::Value,
    pub property_names: BTreeSet<String>,
    pub required_properties: BTreeSet<String>,
    pub from_kinds: BTreeSet<String>,
    pub to_kinds: BTreeSet<String>,
    pub cardinality: Cardinality,
    pub endpoint_existence: EndpointExistence,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaEdgeDoc {
    pub name: String,
    pub transitive: bool,
    pub symmetric: bool,
    pub reflexive: bool,
    pub inverse: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDoc {
    pub meta_edge: String,
    pub from: String,
    pub to: String,
}

/// A deterministic, sorted-map rendering of [`Closures`] for the canonical
/// document. Built once at serialization time from the live `HashMap`-based
/// closures the registry keeps for O(1) lookups.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClosuresDoc {
    pub sub_class_ancestors: BTreeMap<String, BTreeSet<String>>,
    pub sub_class_descendants: BTreeMap<String, BTreeSet<String>>,
    pub broader_closure: BTreeMap<String, BTreeSet<String>>,
    pub narrower_closure: BTreeMap<String, BTreeSet<String>>,
    pub equivalence_sets: BTreeMap<String, BTreeSet<String>>,
    pub iri_to_kind: BTreeMap<String, String>,
    pub disjoint_pairs: BTreeSet<String>,
    pub part_of_closure: BTreeMap<String, BTreeSet<String>>,
    pub has_part_closure: BTreeMap<String, BTreeSet<String>>,
    pub edge_inverses: BTreeMap<String, String>,
    pub edge_implications_closure: BTreeMap<String, BTreeSet<String>>,
    pub edge_implying_closure: BTreeMap<String, BTreeSet<String>>,
}

fn sort_map(m: &std::collections::HashMap<String, std::collections::HashSet<String>>) -> BTreeMap<String, BTreeSet<String>> {
    m.iter()
        .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
        .collect()
}

impl From<&Closures> for ClosuresDoc {
    fn from(c: &Closures) -> Self {
        Self {
            sub_class_ancestors: sort_map(&c.sub_class_ancestors),
            sub_class_descendants: sort_map(&c.sub_class_descendants),
            broader_closure: sort_map(&c.broader_closure),
            narrower_closure: sort_map(&c.narrower_closure),
            equivalence_sets: sort_map(&c.equivalence_sets),
            iri_to_kind: c.iri_to_kind.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            disjoint_pairs: c.disjoint_pairs.iter().cloned().collect(),
            part_of_closure: sort_map(&c.part_of_closure),
            has_part_closure: sort_map(&c.has_part_closure),
            edge_inverses: c.edge_inverses.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            edge_implications_closure: sort_map(&c.edge_implications_closure),
            edge_implying_closure: sort_map(&c.edge_implying_closure),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyDoc {
    pub meta_edges: Vec<MetaEdgeDoc>,
    pub relations: Vec<RelationDoc>,
    pub closures: ClosuresDoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    pub graph_id: String,
    pub version: u64,
    pub generated_at: String,
    pub nodes: BTreeMap<String, NodeDoc>,
    pub edges: BTreeMap<String, EdgeDoc>,
    pub ontology: OntologyDoc,
    pub defaults: GraphDefaults,
}

/// Build the canonical document for a graph definition at a given version.
pub fn serialize_schema(
    def: &GraphDefinition,
    closures: &Closures,
    version: u64,
    generated_at: impl Into<String>,
) -> SchemaDocument {
    let nodes = def
        .nodes
        .iter()
        .map(|(name, kind)| {
            (
                name.to_string(),
                NodeDoc {
                    name: name.to_string(),
                    properties: schema_to_value(&kind.schema),
                    property_names: kind.schema.property_names().into_iter().collect(),
                    required_properties: kind.schema.required_names().into_iter().collect(),
                    unique_constraints: kind.unique_constraints.clone(),
                    on_delete: kind.on_delete,
                    description: kind.description.clone(),
                },
            )
        })
        .collect();

    let edges = def
        .edges
        .iter()
        .map(|(name, kind)| {
            (
                name.to_string(),
                EdgeDoc {
                    name: name.to_string(),
                    properties: schema_to_value(&kind.schema),
                    property_names: kind.schema.property_names().into_iter().collect(),
                    required_properties: kind.schema.required_names().into_iter().collect(),
                    from_kinds: kind.from_kinds.iter().map(|k| k.to_string()).collect(),
                    to_kinds: kind.to_kinds.iter().map(|k| k.to_string()).collect(),
                    cardinality: kind.cardinality,
                    endpoint_existence: kind.endpoint_existence,
                    description: kind.description.clone(),
                },
            )
        })
        .collect();

    let meta_edges: Vec<MetaEdgeDoc> = {
        let mut v: Vec<MetaEdgeDoc> = def
            .meta_edges
            .values()
            .map(|m: &MetaEdge| MetaEdgeDoc {
                name: m.name.to_string(),
                transitive: m.transitive,
                symmetric: m.symmetric,
                reflexive: m.reflexive,
                inverse: m.inverse.as_ref().map(|i| i.to_string()),
            })
            .collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    };

    let relations: Vec<RelationDoc> = {
        let mut v: Vec<RelationDoc> = def
            .ontology
            .iter()
            .map(|r: &OntologyRelation| RelationDoc {
                meta_edge: r.meta_edge.to_string(),
                from: r.from.as_str().to_string(),
                to: r.to.as_str().to_string(),
            })
            .collect();
        v.sort_by(|a, b| (a.meta_edge.clone(), a.from.clone(), a.to.clone()).cmp(&(b.meta_edge.clone(), b.from.clone(), b.to.clone())));
        v
    };

    SchemaDocument {
        graph_id: def.graph_id.clone(),
        version,
        generated_at: generated_at.into(),
        nodes,
        edges,
        ontology: OntologyDoc {
            meta_edges,
            relations,
            closures: closures.into(),
        },
        defaults: def.defaults.clone(),
    }
}

fn schema_to_value(schema: &std::sync::Arc<dyn crate::types::PropertySchema>) -> serde_json::Value {
    serde_json::to_value(schema.describe()).unwrap_or(serde_json::Value::Null)
}
