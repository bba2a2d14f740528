//! Bulk writes and the batch validation caches (`spec.md` §4.F).
//!
//! Bulk imports frequently repeat the same props shape across many items
//! (the same client-side object literal, serialized per row); caching
//! validation by a hash of the kind and the serialized props avoids
//! re-running the property schema's `validate` for rows that are
//! structurally identical. [`BatchEdgeCache`] does the analogous job for
//! edge batches: it memoizes the backend lookups cardinality/uniqueness
//! prechecks depend on, and tracks the edges a batch has already decided to
//! insert but hasn't flushed to the backend yet, so two items later in the
//! same batch still see each other for cardinality purposes.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::backend::NodeRow;
use crate::error::{GraphError, Result, ValidationIssue};
use crate::instance::{EdgeInstance, NodeInstance};
use crate::types::Cardinality;

use super::collection::{get_or_create_edge_by_endpoints, Collection, GetOrCreateAction, GetOrCreateEdgeOptions, IfExists};
use super::edge::create_edge_inner;
use super::node::{create_node_inner, update_node_inner};
use super::PipelineContext;

fn props_fingerprint(kind: &str, props: &serde_json::Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    kind.hash(&mut hasher);
    // `to_string` on a `serde_json::Value` backed by `BTreeMap` is key-order
    // stable, so structurally-equal objects fingerprint identically.
    props.to_string().hash(&mut hasher);
    hasher.finish()
}

#[derive(Default)]
pub struct BatchValidationCache {
    entries: HashMap<u64, std::result::Result<serde_json::Value, Vec<ValidationIssue>>>,
}

impl BatchValidationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate `props` against `kind`'s schema, consulting/populating the
    /// cache by a fingerprint of `(kind, props)`.
    pub fn validate(
        &mut self,
        ctx: &PipelineContext,
        kind: &str,
        props: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let node_kind = ctx.def.nodes.get(kind).ok_or_else(|| GraphError::kind_not_found(kind))?;
        let key = props_fingerprint(kind, props);
        if let Some(cached) = self.entries.get(&key) {
            return cached.clone().map_err(GraphError::validation);
        }
        let result = node_kind.schema.validate(props);
        self.entries.insert(key, result.clone());
        result.map_err(GraphError::validation)
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub created: Vec<NodeInstance>,
    pub failed: Vec<(usize, GraphError)>,
}

/// Create many nodes of the same kind, validating through a shared cache.
/// A failure on one item does not abort the rest; failures are reported
/// per index so the caller can decide how to handle partial success.
pub async fn validate_batch(
    ctx: &PipelineContext,
    kind: &str,
    items: Vec<serde_json::Value>,
    cache: &mut BatchValidationCache,
) -> Result<BatchOutcome> {
    let mut created = Vec::with_capacity(items.len());
    let mut failed = Vec::new();

    for (index, props) in items.into_iter().enumerate() {
        let validated = match cache.validate(ctx, kind, &props) {
            Ok(v) => v,
            Err(e) => {
                failed.push((index, e));
                continue;
            }
        };
        let id = uuid::Uuid::new_v4().to_string();
        match create_node_inner(ctx, kind, &id, validated, None, None).await {
            Ok(instance) => created.push(instance),
            Err(e) => {
                warn!(index, error = %e, "batch item failed after validation");
                failed.push((index, e));
            }
        }
    }

    Ok(BatchOutcome { created, failed })
}

/// One node to insert without a per-item result: [`bulk_insert_nodes`]
/// aborts on the first failure instead of collecting partial outcomes.
#[derive(Debug, Clone)]
pub struct BulkNodeItem {
    pub id: Option<String>,
    pub props: serde_json::Value,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Insert many nodes of the same kind, stopping at the first failure.
/// Unlike [`validate_batch`], there is no per-item outcome to inspect
/// afterwards: a caller who needs partial-success accounting wants that
/// function instead.
pub async fn bulk_insert_nodes(
    ctx: &PipelineContext,
    kind: &str,
    items: Vec<BulkNodeItem>,
    cache: &mut BatchValidationCache,
) -> Result<()> {
    for item in items {
        let validated = cache.validate(ctx, kind, &item.props)?;
        let id = item.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        create_node_inner(ctx, kind, &id, validated, item.valid_from, item.valid_to).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct BulkUpsertOutcome {
    pub created: Vec<NodeInstance>,
    pub updated: Vec<NodeInstance>,
    pub failed: Vec<(usize, GraphError)>,
}

/// Upsert many `(id, props)` pairs against `kind` in one pass: a single
/// batched `getNodes` lookup buckets items into creates and updates, soft-
/// deleted matches are resurrected (`clearDeleted`) as part of their update,
/// and failures are reported per index rather than aborting the batch.
pub async fn bulk_upsert_nodes(
    ctx: &PipelineContext,
    kind: &str,
    items: Vec<(String, serde_json::Value)>,
    cache: &mut BatchValidationCache,
) -> Result<BulkUpsertOutcome> {
    let ids: Vec<(String, String)> = items.iter().map(|(id, _)| (kind.to_string(), id.clone())).collect();
    let existing_rows = ctx.backend.get_nodes(ctx.graph_id(), &ids).await?;
    let existing_by_id: HashMap<&str, &NodeRow> = existing_rows.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut outcome = BulkUpsertOutcome::default();
    for (index, (id, props)) in items.into_iter().enumerate() {
        let validated = match cache.validate(ctx, kind, &props) {
            Ok(v) => v,
            Err(e) => {
                outcome.failed.push((index, e));
                continue;
            }
        };
        match existing_by_id.get(id.as_str()) {
            Some(existing) => {
                let clear_deleted = !existing.meta.is_live();
                match update_node_inner(ctx, kind, &id, validated, clear_deleted).await {
                    Ok(instance) => outcome.updated.push(instance),
                    Err(e) => outcome.failed.push((index, e)),
                }
            }
            None => match create_node_inner(ctx, kind, &id, validated, None, None).await {
                Ok(instance) => outcome.created.push(instance),
                Err(e) => outcome.failed.push((index, e)),
            },
        }
    }
    Ok(outcome)
}

/// One `(instance, action)` outcome, or the error that kind of item failed
/// with, produced by a `bulk_get_or_create_*` call for one input item.
pub type GetOrCreateResult<T> = std::result::Result<(T, GetOrCreateAction), GraphError>;

/// Run [`Collection::get_or_create_by_constraint`] for many candidate
/// `props` objects, wrapped in a single transaction when the backend
/// supports one (`spec.md` §4.F.6).
pub async fn bulk_get_or_create_by_constraint(
    ctx: &PipelineContext,
    kind: &str,
    constraint_name: &str,
    items: Vec<serde_json::Value>,
    if_exists: IfExists,
) -> Result<Vec<GetOrCreateResult<NodeInstance>>> {
    crate::backend::with_transaction(&ctx.backend, |backend| {
        let ctx = ctx.on_backend(backend);
        async move {
            let collection = Collection::new(&ctx, kind);
            let mut out = Vec::with_capacity(items.len());
            for props in items {
                out.push(
                    collection
                        .get_or_create_by_constraint(constraint_name, props, if_exists)
                        .await,
                );
            }
            Ok(out)
        }
    })
    .await
}

/// One edge to get-or-create-by-endpoints, or to bulk-create, within a
/// batch.
#[derive(Debug, Clone)]
pub struct BulkEdgeItem {
    pub id: Option<String>,
    pub from_kind: String,
    pub from_id: String,
    pub to_kind: String,
    pub to_id: String,
    pub props: serde_json::Value,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Run [`get_or_create_edge_by_endpoints`] for many items of the same edge
/// kind, wrapped in a single transaction when the backend supports one.
pub async fn bulk_get_or_create_by_endpoints(
    ctx: &PipelineContext,
    edge_kind: &str,
    items: Vec<BulkEdgeItem>,
    options: GetOrCreateEdgeOptions,
) -> Result<Vec<GetOrCreateResult<EdgeInstance>>> {
    crate::backend::with_transaction(&ctx.backend, |backend| {
        let ctx = ctx.on_backend(backend);
        let options = options.clone();
        async move {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(
                    get_or_create_edge_by_endpoints(
                        &ctx,
                        edge_kind,
                        &item.from_kind,
                        &item.from_id,
                        &item.to_kind,
                        &item.to_id,
                        item.props,
                        options.clone(),
                    )
                    .await,
                );
            }
            Ok(out)
        }
    })
    .await
}

/// Memoizes the backend lookups edge cardinality/endpoint prechecks make
/// (`getNode`, `countEdgesFrom`, `edgeExistsBetween`) and tracks edges a
/// batch has already committed to inserting but not yet flushed to the
/// backend, so later items in the same batch see earlier ones for
/// cardinality purposes without a round trip (`spec.md` §4.F.6).
#[derive(Default)]
pub struct BatchEdgeCache {
    nodes: HashMap<(String, String), Option<NodeRow>>,
    active_from_counts: HashMap<(String, String, String), usize>,
    total_from_counts: HashMap<(String, String, String), usize>,
    exists_between: HashMap<(String, String, String, String, String), bool>,
    pending_total_from: HashMap<(String, String, String), usize>,
    pending_active_from: HashMap<(String, String, String), usize>,
    pending_pairs: HashSet<(String, String, String, String, String)>,
}

impl BatchEdgeCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_node(&mut self, ctx: &PipelineContext, kind: &str, id: &str) -> Result<Option<NodeRow>> {
        let key = (kind.to_string(), id.to_string());
        if let Some(cached) = self.nodes.get(&key) {
            return Ok(cached.clone());
        }
        let node = ctx.backend.get_node(ctx.graph_id(), kind, id).await?;
        self.nodes.insert(key, node.clone());
        Ok(node)
    }

    async fn count_edges_from(
        &mut self,
        ctx: &PipelineContext,
        edge_kind: &str,
        from_kind: &str,
        from_id: &str,
        active_only: bool,
    ) -> Result<usize> {
        let key = (edge_kind.to_string(), from_kind.to_string(), from_id.to_string());
        let baseline_cache = if active_only { &mut self.active_from_counts } else { &mut self.total_from_counts };
        let baseline = match baseline_cache.get(&key) {
            Some(&count) => count,
            None => {
                let count = ctx
                    .backend
                    .count_edges_from(ctx.graph_id(), edge_kind, from_kind, from_id, active_only)
                    .await?;
                baseline_cache.insert(key.clone(), count);
                count
            }
        };
        let pending = if active_only { &self.pending_active_from } else { &self.pending_total_from };
        Ok(baseline + pending.get(&key).copied().unwrap_or(0))
    }

    async fn edge_exists_between(
        &mut self,
        ctx: &PipelineContext,
        edge_kind: &str,
        from_kind: &str,
        from_id: &str,
        to_kind: &str,
        to_id: &str,
    ) -> Result<bool> {
        let key = (
            edge_kind.to_string(),
            from_kind.to_string(),
            from_id.to_string(),
            to_kind.to_string(),
            to_id.to_string(),
        );
        if self.pending_pairs.contains(&key) {
            return Ok(true);
        }
        if let Some(&cached) = self.exists_between.get(&key) {
            return Ok(cached);
        }
        let exists = ctx
            .backend
            .edge_exists_between(ctx.graph_id(), edge_kind, from_kind, from_id, to_kind, to_id)
            .await?;
        self.exists_between.insert(key, exists);
        Ok(exists)
    }

    /// Record that `edge_kind` from `(from_kind, from_id)` to `(to_kind,
    /// to_id)` has been accepted into the batch, so later items see it for
    /// cardinality purposes before it has been flushed to the backend.
    fn record_pending(
        &mut self,
        edge_kind: &str,
        from_kind: &str,
        from_id: &str,
        to_kind: &str,
        to_id: &str,
        valid_to: Option<DateTime<Utc>>,
    ) {
        let from_key = (edge_kind.to_string(), from_kind.to_string(), from_id.to_string());
        *self.pending_total_from.entry(from_key.clone()).or_insert(0) += 1;
        if valid_to.is_none() {
            *self.pending_active_from.entry(from_key).or_insert(0) += 1;
        }
        self.pending_pairs.insert((
            edge_kind.to_string(),
            from_kind.to_string(),
            from_id.to_string(),
            to_kind.to_string(),
            to_id.to_string(),
        ));
    }
}

async fn check_cardinality_cached(
    ctx: &PipelineContext,
    cache: &mut BatchEdgeCache,
    edge_kind_name: &str,
    cardinality: Cardinality,
    from_kind: &str,
    from_id: &str,
    to_kind: &str,
    to_id: &str,
    valid_to: Option<DateTime<Utc>>,
) -> Result<()> {
    match cardinality {
        Cardinality::Many => Ok(()),
        Cardinality::One => {
            let count = cache.count_edges_from(ctx, edge_kind_name, from_kind, from_id, false).await?;
            if count > 0 {
                return Err(GraphError::cardinality(edge_kind_name, "one", from_kind, from_id));
            }
            Ok(())
        }
        Cardinality::OneActive => {
            if valid_to.is_some() {
                return Ok(());
            }
            let count = cache.count_edges_from(ctx, edge_kind_name, from_kind, from_id, true).await?;
            if count > 0 {
                return Err(GraphError::cardinality(edge_kind_name, "oneActive", from_kind, from_id));
            }
            Ok(())
        }
        Cardinality::Unique => {
            let exists = cache.edge_exists_between(ctx, edge_kind_name, from_kind, from_id, to_kind, to_id).await?;
            if exists {
                return Err(GraphError::cardinality(edge_kind_name, "unique", from_kind, from_id));
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchEdgeOutcome {
    pub created: Vec<EdgeInstance>,
    pub failed: Vec<(usize, GraphError)>,
}

/// Create many edges of the same kind through a shared [`BatchEdgeCache`],
/// so cardinality/endpoint decisions made earlier in the batch are honored
/// by items later in the same batch without re-querying the backend for
/// each one (`spec.md` §4.F.6). A failure on one item does not abort the
/// rest; this bypasses the single-item operation-hook envelope entirely,
/// as batch writes do throughout this pipeline.
pub async fn bulk_create_edges(
    ctx: &PipelineContext,
    edge_kind: &str,
    items: Vec<BulkEdgeItem>,
    cache: &mut BatchEdgeCache,
) -> Result<BatchEdgeOutcome> {
    let kind_def = ctx.def.edges.get(edge_kind).ok_or_else(|| GraphError::kind_not_found(edge_kind))?;

    let mut created = Vec::with_capacity(items.len());
    let mut failed = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        let outcome = bulk_create_one_edge(ctx, cache, edge_kind, kind_def, item).await;
        match outcome {
            Ok(instance) => created.push(instance),
            Err(e) => failed.push((index, e)),
        }
    }

    Ok(BatchEdgeOutcome { created, failed })
}

async fn bulk_create_one_edge(
    ctx: &PipelineContext,
    cache: &mut BatchEdgeCache,
    edge_kind: &str,
    kind_def: &crate::types::EdgeKind,
    item: BulkEdgeItem,
) -> Result<EdgeInstance> {
    let from_allowed = kind_def
        .from_kinds
        .iter()
        .any(|k| ctx.registry.is_assignable_to(&item.from_kind, k.as_str()));
    if !from_allowed {
        return Err(GraphError::validation_msg(
            "fromKind",
            format!("'{}' is not an allowed source kind for edge '{edge_kind}'", item.from_kind),
        ));
    }
    let to_allowed = kind_def
        .to_kinds
        .iter()
        .any(|k| ctx.registry.is_assignable_to(&item.to_kind, k.as_str()));
    if !to_allowed {
        return Err(GraphError::validation_msg(
            "toKind",
            format!("'{}' is not an allowed target kind for edge '{edge_kind}'", item.to_kind),
        ));
    }

    for (endpoint, kind, id) in [("from", item.from_kind.as_str(), item.from_id.as_str()), ("to", item.to_kind.as_str(), item.to_id.as_str())] {
        let node = cache.get_node(ctx, kind, id).await?;
        let ok = match (&node, kind_def.endpoint_existence) {
            (None, _) => false,
            (Some(n), crate::types::EndpointExistence::NotDeleted) => n.meta.is_live(),
            (Some(n), crate::types::EndpointExistence::CurrentlyValid) => n.meta.is_live() && n.meta.is_valid_at(ctx.now()),
            (Some(_), crate::types::EndpointExistence::Ever) => true,
        };
        if !ok {
            return Err(GraphError::endpoint_not_found(edge_kind, endpoint, kind, id));
        }
    }

    let validated = kind_def.schema.validate(&item.props).map_err(GraphError::validation)?;

    check_cardinality_cached(
        ctx,
        cache,
        edge_kind,
        kind_def.cardinality,
        &item.from_kind,
        &item.from_id,
        &item.to_kind,
        &item.to_id,
        item.valid_to,
    )
    .await?;

    let id = item.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let instance = create_edge_inner(
        ctx,
        edge_kind,
        &id,
        &item.from_kind,
        &item.from_id,
        &item.to_kind,
        &item.to_id,
        validated,
        item.valid_from,
        item.valid_to,
    )
    .await?;

    cache.record_pending(edge_kind, &item.from_kind, &item.from_id, &item.to_kind, &item.to_id, item.valid_to);
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_stable_for_equal_values() {
        let a = props_fingerprint("Person", &json!({"name": "Ada"}));
        let b = props_fingerprint("Person", &json!({"name": "Ada"}));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_by_kind() {
        let a = props_fingerprint("Person", &json!({"name": "Ada"}));
        let b = props_fingerprint("Company", &json!({"name": "Ada"}));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn edge_cache_counts_pending_inserts_within_a_batch() {
        let mut cache = BatchEdgeCache::new();
        cache.record_pending("WorksAt", "Person", "alice", "Company", "acme", None);
        assert_eq!(cache.pending_total_from.get(&("WorksAt".into(), "Person".into(), "alice".into())).copied(), Some(1));
        assert_eq!(cache.pending_active_from.get(&("WorksAt".into(), "Person".into(), "alice".into())).copied(), Some(1));
    }

    #[tokio::test]
    async fn edge_cache_does_not_count_backfilled_edges_as_pending_active() {
        let mut cache = BatchEdgeCache::new();
        let historical = Utc::now();
        cache.record_pending("WorksAt", "Person", "alice", "Company", "acme", Some(historical));
        assert_eq!(cache.pending_total_from.get(&("WorksAt".into(), "Person".into(), "alice".into())).copied(), Some(1));
        assert_eq!(cache.pending_active_from.get(&("WorksAt".into(), "Person".into(), "alice".into())), None);
    }
}
