//! Schema serializer (component D, part 2): the content hash.
//!
//! Two schemas with the same semantic content and any version/timestamp
//! must produce the same hash: `version` and `generatedAt` are stripped
//! before hashing, and every object's keys are sorted recursively (free,
//! since our JSON values are `BTreeMap`-backed, see `document.rs`).

use sha2::{Digest, Sha256};

use super::document::SchemaDocument;

/// Serialize `doc` with `version`/`generatedAt` removed, sort-stable by
/// construction, and return the first 16 hex characters of its SHA-256.
pub fn content_hash(doc: &SchemaDocument) -> String {
    let mut value = serde_json::to_value(doc).expect("SchemaDocument always serializes");
    if let Some(obj) = value.as_object_mut() {
        obj.remove("version");
        obj.remove("generatedAt");
    }
    let canonical = serde_json::to_vec(&value).expect("canonical value always serializes");
    let digest = Sha256::digest(&canonical);
    let hex = hex_encode(&digest);
    hex[..16].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::build_closures;
    use crate::schema::document::serialize_schema;
    use crate::types::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct EmptySchema;
    impl PropertySchema for EmptySchema {
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
            vec![]
        }
        fn required_names(&self) -> Vec<String> {
            vec![]
        }
    }

    fn sample_def(graph_id: &str) -> GraphDefinition {
        let person = define_node(
            "Person",
            NodeOptions {
                schema: Arc::new(EmptySchema),
                description: None,
                on_delete: DeleteBehavior::Restrict,
                unique_constraints: vec![],
            },
        )
        .unwrap();
        define_graph(GraphDefinitionOptions {
            graph_id: graph_id.to_string(),
            nodes: vec![person],
            edges: vec![],
            meta_edges: vec![],
            ontology: vec![],
            defaults: GraphDefaults::default(),
        })
        .unwrap()
    }

    #[test]
    fn hash_is_16_lowercase_hex_chars() {
        let def = sample_def("g1");
        let closures = build_closures(&def.ontology);
        let doc = serialize_schema(&def, &closures, 1, "2024-01-01T00:00:00Z");
        let hash = content_hash(&doc);
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn hash_is_independent_of_version_and_timestamp() {
        let def = sample_def("g1");
        let closures = build_closures(&def.ontology);
        let doc_v1 = serialize_schema(&def, &closures, 1, "2024-01-01T00:00:00Z");
        let doc_v2 = serialize_schema(&def, &closures, 2, "2025-06-01T00:00:00Z");
        assert_eq!(content_hash(&doc_v1), content_hash(&doc_v2));
    }

    #[test]
    fn hash_changes_when_a_node_is_added() {
        let def1 = sample_def("g1");
        let closures1 = build_closures(&def1.ontology);
        let doc1 = serialize_schema(&def1, &closures1, 1, "t");

        let mut def2 = def1.clone();
        let company = define_node(
            "Company",
            NodeOptions {
                schema: Arc::new(EmptySchema),
                description: None,
                on_delete: DeleteBehavior::Restrict,
                unique_constraints: vec![],
            },
        )
        .unwrap();
        def2.nodes.insert(company.name.clone(), company);
        let closures2 = build_closures(&def2.ontology);
        let doc2 = serialize_schema(&def2, &closures2, 1, "t");

        assert_ne!(content_hash(&doc1), content_hash(&doc2));
    }

    #[test]
    fn hash_changes_when_a_relation_is_added() {
        let def1 = sample_def("g1");
        let closures1 = build_closures(&def1.ontology);
        let doc1 = serialize_schema(&def1, &closures1, 1, "t");

        let mut def2 = def1.clone();
        def2.ontology.push(OntologyRelation::new("subClassOf", "Person", "Agent"));
        let closures2 = build_closures(&def2.ontology);
        let doc2 = serialize_schema(&def2, &closures2, 1, "t");

        assert_ne!(content_hash(&doc1), content_hash(&doc2));
    }
}
