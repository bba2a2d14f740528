//! Shared fixtures for the write-pipeline integration tests: a minimal
//! [`PropertySchema`] that enforces required fields, and a small
//! Person/Company/Organization graph used across scenarios.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use schemars::schema::RootSchema;
use typegraph_backend::MemoryBackend;
use typegraph_core::{
    define_edge, define_graph, define_node, Cardinality, DeleteBehavior, EdgeOptions,
    EndpointExistence, GraphDefaults, GraphDefinition, GraphDefinitionOptions, NodeOptions,
    OntologyRelation, PipelineContext, PropertySchema, UniquenessConstraint, ValidationIssue,
};

/// A property schema that only checks required-field presence; good enough
/// for exercising the pipeline without a real JSON Schema validator.
#[derive(Debug)]
pub struct RequiredFieldsSchema {
    pub required: Vec<&'static str>,
    pub known: Vec<&'static str>,
}

impl RequiredFieldsSchema {
    pub fn new(known: &[&'static str], required: &[&'static str]) -> Arc<dyn PropertySchema> {
        Arc::new(Self {
            required: required.to_vec(),
            known: known.to_vec(),
        })
    }
}

impl PropertySchema for RequiredFieldsSchema {
    fn validate(
        &self,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for field in &self.required {
            if input.get(field).map(|v| v.is_null()).unwrap_or(true) {
                issues.push(ValidationIssue::new(*field, "required field missing"));
            }
        }
        if issues.is_empty() {
            Ok(input.clone())
        } else {
            Err(issues)
        }
    }

    fn describe(&self) -> RootSchema {
        schemars::schema_for!(serde_json::Value)
    }

    fn property_names(&self) -> Vec<String> {
        self.known.iter().map(|s| s.to_string()).collect()
    }

    fn required_names(&self) -> Vec<String> {
        self.required.iter().map(|s| s.to_string()).collect()
    }
}

/// Person(id, name, email) -worksAt(cardinality)-> Company(id, name).
/// `Organization` is declared `disjointWith` `Person`.
pub fn person_company_graph(
    person_on_delete: DeleteBehavior,
    edge_cardinality: Cardinality,
    email_unique: Option<UniquenessConstraint>,
) -> GraphDefinition {
    let person_schema = RequiredFieldsSchema::new(&["name", "email"], &["name"]);
    let company_schema = RequiredFieldsSchema::new(&["name"], &["name"]);

    let person = define_node(
        "Person",
        NodeOptions {
            schema: person_schema,
            description: None,
            on_delete: person_on_delete,
            unique_constraints: email_unique.into_iter().collect(),
        },
    )
    .expect("valid Person kind");

    let company = define_node(
        "Company",
        NodeOptions {
            schema: company_schema.clone(),
            description: None,
            on_delete: DeleteBehavior::Restrict,
            unique_constraints: vec![],
        },
    )
    .expect("valid Company kind");

    let organization = define_node(
        "Organization",
        NodeOptions {
            schema: company_schema,
            description: None,
            on_delete: DeleteBehavior::Restrict,
            unique_constraints: vec![],
        },
    )
    .expect("valid Organization kind");

    let works_at = define_edge(
        "worksAt",
        EdgeOptions {
            schema: RequiredFieldsSchema::new(&["role"], &[]),
            description: None,
            from_kinds: BTreeSet::from(["Person".into()]),
            to_kinds: BTreeSet::from(["Company".into()]),
            cardinality: edge_cardinality,
            endpoint_existence: EndpointExistence::NotDeleted,
        },
    )
    .expect("valid worksAt kind");

    define_graph(GraphDefinitionOptions {
        graph_id: "test-graph".to_string(),
        nodes: vec![person, company, organization],
        edges: vec![works_at],
        meta_edges: vec![],
        ontology: vec![OntologyRelation::new("disjointWith", "Person", "Organization")],
        defaults: GraphDefaults::default(),
    })
    .expect("valid graph definition")
}

pub fn context(def: GraphDefinition) -> PipelineContext {
    let backend = Arc::new(MemoryBackend::new());
    PipelineContext::new(backend, Arc::new(def))
}
