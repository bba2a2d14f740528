//! The write pipeline (component F): validation, uniqueness/cardinality
//! prechecks, CRUD, embedding sync, batch writes, and import/export.

pub mod batch;
pub mod collection;
pub mod edge;
pub mod envelope;
pub mod interchange;
pub mod node;
pub mod uniqueness;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::Backend;
use crate::ontology::KindRegistry;
use crate::types::GraphDefinition;

use envelope::OperationHooks;

/// A source of the current instant, abstracted so tests can supply a fixed
/// or stepped clock instead of the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared state every pipeline operation runs against: the backend handle
/// (possibly a transaction-scoped one, see [`crate::backend::with_transaction`]),
/// the compile-time graph definition, its ontology registry, a clock, and
/// the operation-hook envelope's observer callbacks.
#[derive(Clone)]
pub struct PipelineContext {
    pub backend: Arc<dyn Backend>,
    pub def: Arc<GraphDefinition>,
    pub registry: Arc<KindRegistry>,
    pub clock: Arc<dyn Clock>,
    pub hooks: OperationHooks,
}

impl PipelineContext {
    pub fn new(backend: Arc<dyn Backend>, def: Arc<GraphDefinition>) -> Self {
        let registry = Arc::new(KindRegistry::new(&def.ontology));
        Self {
            backend,
            def,
            registry,
            clock: Arc::new(SystemClock),
            hooks: OperationHooks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_hooks(mut self, hooks: OperationHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn graph_id(&self) -> &str {
        &self.def.graph_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Rebind this context onto a different backend handle (a transaction
    /// scope, typically), keeping the definition/registry/clock/hooks.
    pub fn on_backend(&self, backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            def: self.def.clone(),
            registry: self.registry.clone(),
            clock: self.clock.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

pub use batch::{
    bulk_create_edges, bulk_get_or_create_by_constraint, bulk_get_or_create_by_endpoints, bulk_insert_nodes,
    bulk_upsert_nodes, validate_batch, BatchEdgeCache, BatchEdgeOutcome, BatchOutcome, BatchValidationCache,
    BulkEdgeItem, BulkNodeItem, BulkUpsertOutcome, GetOrCreateResult,
};
pub use collection::{get_or_create_edge_by_endpoints, Collection, GetOrCreateAction, GetOrCreateEdgeOptions, IfExists};
pub use edge::{create_edge, delete_edge, get_edge, update_edge, update_edge_with, CreateEdgeInput};
pub use envelope::{new_envelope, run_with_envelope, OperationEnvelope, OperationHooks, OperationKind};
pub use interchange::{
    export_graph, import_graph, ConflictStrategy, GraphExport, ImportOptions, ImportOutcome, OnUnknownProperty,
    Source,
};
pub use node::{create_node, delete_node, get_node, hard_delete_node, update_node, update_node_with, CreateNodeInput};
