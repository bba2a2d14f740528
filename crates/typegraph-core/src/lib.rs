//! typegraph-core - typed, temporally-aware property graph engine
//!
//! This crate provides the core functionality for the graph engine:
//! - Compile-time node/edge kind registration with property schemas
//! - Ontology reasoning over meta-edges (subclass, part-of, equivalence, ...)
//! - Schema lifecycle: canonical serialization, content hashing, diffing,
//!   and a migration state machine
//! - A backend-agnostic write pipeline: validation, uniqueness and
//!   cardinality prechecks, soft/hard delete, embedding sync, batch writes,
//!   and import/export

pub mod backend;
pub mod error;
pub mod instance;
pub mod ontology;
pub mod pipeline;
pub mod schema;
pub mod types;

// Error re-exports
pub use error::{ErrorKind, GraphError, Result, ValidationIssue};

// Type re-exports
pub use types::{
    Cardinality, Collation, DeleteBehavior, EdgeKind, EdgeOptions, EndpointExistence,
    GraphDefaults, GraphDefinition, GraphDefinitionOptions, InferenceCategory, KindName,
    MetaEdge, MetaEdgeName, MetaEdgeOptions, NodeKind, NodeOptions, OntologyRelation,
    PredicateOp, PropertySchema, RelationEndpoint, TemporalMode, UniquenessConstraint,
    UniquenessScope, WherePredicate, BUILTIN_META_EDGES,
};
pub use types::{define_edge, define_graph, define_node, meta_edge};

// Ontology re-exports
pub use ontology::{build_closures, Closures, KindRegistry};

// Backend contract re-exports
pub use backend::{
    Backend, BackendCapabilities, EdgeMetadata, EdgeRow, EmbeddingKey, NewEdgeRow, NewNodeRow,
    NodeMetadata, NodeRow, SchemaVersionRow,
};
pub use backend::with_transaction;

// Instance re-exports
pub use instance::{EdgeInstance, NodeInstance, TemporalQuery};

// Schema re-exports
pub use schema::{
    content_hash, diff_schema, serialize_schema, ChangeKind, EdgeChange, EdgeDoc, EnsureOutcome,
    EnsureSchemaOptions, MigrationHook, NodeChange, NodeDoc, SchemaDiff, SchemaDocument,
    SchemaManager, Severity,
};

// Pipeline re-exports
pub use pipeline::{
    bulk_create_edges, bulk_get_or_create_by_constraint, bulk_get_or_create_by_endpoints,
    bulk_insert_nodes, bulk_upsert_nodes, create_edge, create_node, delete_edge, delete_node,
    export_graph, get_edge, get_or_create_edge_by_endpoints, get_node, hard_delete_node,
    import_graph, new_envelope, run_with_envelope, update_edge, update_edge_with, update_node,
    update_node_with, validate_batch, BatchEdgeCache, BatchEdgeOutcome, BatchOutcome,
    BatchValidationCache, BulkEdgeItem, BulkNodeItem, BulkUpsertOutcome, Clock, Collection,
    ConflictStrategy, CreateEdgeInput, CreateNodeInput, GetOrCreateAction, GetOrCreateEdgeOptions,
    GetOrCreateResult, GraphExport, IfExists, ImportOptions, ImportOutcome, OnUnknownProperty,
    OperationEnvelope, OperationHooks, OperationKind, PipelineContext, Source, SystemClock,
};
