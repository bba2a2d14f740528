//! Schema serializer (component D, part 3): the structured diff.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::document::{EdgeDoc, NodeDoc, SchemaDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Warning,
    Breaking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeChange {
    pub name: String,
    pub change: ChangeKind,
    pub severity: Severity,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeChange {
    pub name: String,
    pub change: ChangeKind,
    pub severity: Severity,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub nodes: Vec<NodeChange>,
    pub edges: Vec<EdgeChange>,
    pub relations_added: Vec<String>,
    pub relations_removed: Vec<String>,
    pub has_changes: bool,
    pub has_breaking_changes: bool,
    pub summary: String,
    pub migration_plan: Vec<String>,
}

fn diff_node(before: Option<&NodeDoc>, after: Option<&NodeDoc>) -> Option<NodeChange> {
    match (before, after) {
        (None, Some(n)) => Some(NodeChange {
            name: n.name.clone(),
            change: ChangeKind::Added,
            severity: Severity::Safe,
            details: vec![format!("node kind '{}' added", n.name)],
        }),
        (Some(n), None) => Some(NodeChange {
            name: n.name.clone(),
            change: ChangeKind::Removed,
            severity: Severity::Breaking,
            details: vec![format!("node kind '{}' removed", n.name)],
        }),
        (Some(b), Some(a)) => {
            let mut details = Vec::new();
            let mut severity = Severity::Safe;

            let removed_props: Vec<_> = b.property_names.difference(&a.property_names).collect();
            if !removed_props.is_empty() {
                details.push(format!("properties removed: {removed_props:?}"));
                severity = Severity::Breaking;
            }

            let added_required: Vec<_> = a
                .required_properties
                .difference(&b.required_properties)
                .collect();
            if !added_required.is_empty() {
                details.push(format!("new required properties: {added_required:?}"));
                severity = Severity::Breaking;
            }

            let added_props: BTreeSet<_> = a.property_names.difference(&b.property_names).collect();
            let added_optional: Vec<_> = added_props
                .iter()
                .filter(|p| !a.required_properties.contains(p.as_str()))
                .collect();
            if !added_optional.is_empty() && severity == Severity::Safe {
                details.push(format!("optional properties added: {added_optional:?}"));
            }

            if b.on_delete != a.on_delete {
                details.push("onDelete behavior changed".to_string());
                severity = severity.max(Severity::Warning);
            }
            if b.unique_constraints != a.unique_constraints {
                details.push("uniqueness constraints changed".to_string());
                severity = severity.max(Severity::Warning);
            }

            if details.is_empty() {
                None
            } else {
                Some(NodeChange {
                    name: a.name.clone(),
                    change: ChangeKind::Modified,
                    severity,
                    details,
                })
            }
        }
        (None, None) => None,
    }
}

fn diff_edge(before: Option<&EdgeDoc>, after: Option<&EdgeDoc>) -> Option<EdgeChange> {
    match (before, after) {
        (None, Some(e)) => Some(EdgeChange {
            name: e.name.clone(),
            change: ChangeKind::Added,
            severity: Severity::Safe,
            details: vec![format!("edge kind '{}' added", e.name)],
        }),
        (Some(e), None) => Some(EdgeChange {
            name: e.name.clone(),
            change: ChangeKind::Removed,
            severity: Severity::Breaking,
            details: vec![format!("edge kind '{}' removed", e.name)],
        }),
        (Some(b), Some(a)) => {
            let mut details = Vec::new();
            let mut severity = Severity::Safe;

            let removed_props: Vec<_> = b.property_names.difference(&a.property_names).collect();
            if !removed_props.is_empty() {
                details.push(format!("properties removed: {removed_props:?}"));
                severity = Severity::Breaking;
            }
            let added_required: Vec<_> = a
                .required_properties
                .difference(&b.required_properties)
                .collect();
            if !added_required.is_empty() {
                details.push(format!("new required properties: {added_required:?}"));
                severity = Severity::Breaking;
            }

            if b.from_kinds != a.from_kinds || b.to_kinds != a.to_kinds {
                details.push("from/to kind sets changed".to_string());
                severity = severity.max(Severity::Warning);
            }
            if b.cardinality != a.cardinality {
                details.push("cardinality changed".to_string());
                severity = severity.max(Severity::Warning);
            }

            if details.is_empty() {
                None
            } else {
                Some(EdgeChange {
                    name: a.name.clone(),
                    change: ChangeKind::Modified,
                    severity,
                    details,
                })
            }
        }
        (None, None) => None,
    }
}

/// Compare two canonical documents. Relations are compared by the
/// `metaEdge:from:to` triple key.
pub fn diff_schema(before: &SchemaDocument, after: &SchemaDocument) -> SchemaDiff {
    let mut node_names: BTreeSet<&String> = before.nodes.keys().collect();
    node_names.extend(after.nodes.keys());
    let nodes: Vec<NodeChange> = node_names
        .into_iter()
        .filter_map(|name| diff_node(before.nodes.get(name), after.nodes.get(name)))
        .collect();

    let mut edge_names: BTreeSet<&String> = before.edges.keys().collect();
    edge_names.extend(after.edges.keys());
    let edges: Vec<EdgeChange> = edge_names
        .into_iter()
        .filter_map(|name| diff_edge(before.edges.get(name), after.edges.get(name)))
        .collect();

    let before_triples: BTreeSet<String> = before
        .ontology
        .relations
        .iter()
        .map(|r| format!("{}:{}:{}", r.meta_edge, r.from, r.to))
        .collect();
    let after_triples: BTreeSet<String> = after
        .ontology
        .relations
        .iter()
        .map(|r| format!("{}:{}:{}", r.meta_edge, r.from, r.to))
        .collect();
    let relations_added: Vec<String> = after_triples.difference(&before_triples).cloned().collect();
    let relations_removed: Vec<String> = before_triples.difference(&after_triples).cloned().collect();

    let added_nodes = nodes.iter().filter(|n| n.change == ChangeKind::Added).count();
    let removed_nodes = nodes.iter().filter(|n| n.change == ChangeKind::Removed).count();
    let modified_nodes = nodes.iter().filter(|n| n.change == ChangeKind::Modified).count();
    let added_edges = edges.iter().filter(|e| e.change == ChangeKind::Added).count();
    let removed_edges = edges.iter().filter(|e| e.change == ChangeKind::Removed).count();
    let modified_edges = edges.iter().filter(|e| e.change == ChangeKind::Modified).count();

    let summary = format!(
        "Nodes: {added_nodes} added, {removed_nodes} removed, {modified_nodes} modified; \
         Edges: {added_edges} added, {removed_edges} removed, {modified_edges} modified; \
         Relations: {} added, {} removed",
        relations_added.len(),
        relations_removed.len()
    );

    let has_changes = !nodes.is_empty()
        || !edges.is_empty()
        || !relations_added.is_empty()
        || !relations_removed.is_empty();

    let has_breaking_changes = nodes.iter().any(|n| n.severity == Severity::Breaking)
        || edges.iter().any(|e| e.severity == Severity::Breaking);

    let mut migration_plan = Vec::new();
    for n in &nodes {
        if n.change == ChangeKind::Removed {
            migration_plan.push(format!("DELETE data for removed kind {}", n.name));
        } else if n.severity == Severity::Breaking {
            migration_plan.push(format!("MIGRATE data for {}: {}", n.name, n.details.join("; ")));
        }
    }
    for e in &edges {
        if e.change == ChangeKind::Removed {
            migration_plan.push(format!("DELETE data for removed kind {}", e.name));
        } else if e.severity == Severity::Breaking {
            migration_plan.push(format!("MIGRATE data for {}: {}", e.name, e.details.join("; ")));
        }
    }

    SchemaDiff {
        nodes,
        edges,
        relations_added,
        relations_removed,
        has_changes,
        has_breaking_changes,
        summary,
        migration_plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::build_closures;
    use crate::schema::document::serialize_schema;
    use crate::types::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Schema {
        props: Vec<&'static str>,
        required: Vec<&'static str>,
    }
    impl PropertySchema for Schema {
        fn validate(
            &self,
            input: &serde_json::Value,
        ) -> std::result::Result<serde_json::Value, Vec<crate::error::ValidationIssue>> {
            Ok(input.clone())
        }
        fn describe(&self) -> schemars::schema::RootSchema {
            schemars::schema_for!(serde_json::Value)
        }
        fn property_names(&self) -> Vec<String> {
            self.props.iter().map(|s| s.to_string()).collect()
        }
        fn required_names(&self) -> Vec<String> {
            self.required.iter().map(|s| s.to_string()).collect()
        }
    }

    fn def_with_person_props(props: &[&'static str], required: &[&'static str]) -> GraphDefinition {
        let person = define_node(
            "Person",
            NodeOptions {
                schema: Arc::new(Schema {
                    props: props.to_vec(),
                    required: required.to_vec(),
                }),
                description: None,
                on_delete: DeleteBehavior::Restrict,
                unique_constraints: vec![],
            },
        )
        .unwrap();
        define_graph(GraphDefinitionOptions {
            graph_id: "g".to_string(),
            nodes: vec![person],
            edges: vec![],
            meta_edges: vec![],
            ontology: vec![],
            defaults: GraphDefaults::default(),
        })
        .unwrap()
    }

    fn doc_for(def: &GraphDefinition) -> SchemaDocument {
        let closures = build_closures(&def.ontology);
        serialize_schema(def, &closures, 1, "t")
    }

    #[test]
    fn identical_schemas_have_no_changes() {
        let def = def_with_person_props(&["name"], &[]);
        let doc = doc_for(&def);
        let diff = diff_schema(&doc, &doc);
        assert!(!diff.has_changes);
        assert!(!diff.has_breaking_changes);
    }

    #[test]
    fn removing_a_node_kind_is_breaking() {
        let before = def_with_person_props(&["name"], &[]);
        let mut after = before.clone();
        after.nodes.clear();
        let diff = diff_schema(&doc_for(&before), &doc_for(&after));
        assert!(diff.has_breaking_changes);
        assert!(diff.nodes.iter().any(|n| n.change == ChangeKind::Removed));
    }

    #[test]
    fn adding_a_required_property_is_breaking() {
        let before = def_with_person_props(&["name"], &[]);
        let after = def_with_person_props(&["name", "email"], &["email"]);
        let diff = diff_schema(&doc_for(&before), &doc_for(&after));
        assert!(diff.has_breaking_changes);
    }

    #[test]
    fn adding_an_optional_property_is_safe() {
        let before = def_with_person_props(&["name"], &[]);
        let after = def_with_person_props(&["name", "nickname"], &[]);
        let diff = diff_schema(&doc_for(&before), &doc_for(&after));
        assert!(!diff.has_breaking_changes);
        assert!(diff.nodes.iter().all(|n| n.severity != Severity::Breaking));
    }
}
