//! Node CRUD: validation, uniqueness prechecks, soft/hard delete, embedding
//! sync (`spec.md` §4.F).

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::backend::{EmbeddingKey, NewNodeRow};
use crate::error::{GraphError, Result};
use crate::instance::NodeInstance;
use crate::types::DeleteBehavior;

use super::envelope::{new_envelope, run_with_envelope, OperationKind};
use super::uniqueness::{applicable_constraints, compute_key};
use super::PipelineContext;

#[derive(Debug, Clone, Default)]
pub struct CreateNodeInput {
    pub id: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

async fn check_uniqueness_precreate(
    ctx: &PipelineContext,
    kind: &str,
    props: &serde_json::Value,
) -> Result<Vec<(String, String, String)>> {
    let mut to_insert = Vec::new();
    for scoped in applicable_constraints(&ctx.def, &ctx.registry, kind) {
        let Some(key) = compute_key(&scoped.constraint, props) else {
            continue;
        };
        if let Some(existing_id) = ctx
            .backend
            .check_unique(ctx.graph_id(), &scoped.bucket_kind, &scoped.constraint.name, &key)
            .await?
        {
            return Err(GraphError::uniqueness(scoped.bucket_kind.clone(), scoped.constraint.name.clone(), existing_id));
        }
        to_insert.push((scoped.bucket_kind, scoped.constraint.name, key));
    }
    Ok(to_insert)
}

/// Sync one embedding field's vector against `value` (`spec.md` line 146):
/// a finite-number array of the declared dimension is upserted; a value
/// that is undefined (the field is entirely absent from `props`) deletes
/// any prior row; `null` or a malformed shape/dimension is silently
/// skipped, leaving any prior row untouched, and must never fail the write
/// that carries it.
async fn sync_embeddings(ctx: &PipelineContext, kind: &str, id: &str, props: &serde_json::Value) -> Result<()> {
    let Some(node_kind) = ctx.def.nodes.get(kind) else {
        return Ok(());
    };
    for (field, dim) in node_kind.schema.embedding_fields() {
        let key = EmbeddingKey {
            graph_id: ctx.graph_id().to_string(),
            kind: kind.to_string(),
            id: id.to_string(),
            field_path: field.clone(),
        };
        let Some(value) = props.get(&field) else {
            // Undefined: the field was never supplied, so drop any prior vector.
            ctx.backend.delete_embedding(key).await?;
            continue;
        };
        if value.is_null() {
            // Explicit null: leave whatever is already indexed alone.
            continue;
        }
        let Some(array) = value.as_array() else {
            continue;
        };
        let vector: Option<Vec<f32>> = array.iter().map(|v| v.as_f64().map(|n| n as f32)).collect();
        let Some(vector) = vector else {
            continue;
        };
        if vector.len() != dim {
            continue;
        }
        ctx.backend.upsert_embedding(key, vector).await?;
    }
    Ok(())
}

pub(super) async fn create_node_inner(
    ctx: &PipelineContext,
    kind: &str,
    id: &str,
    props: serde_json::Value,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
) -> Result<NodeInstance> {
    let node_kind = ctx
        .def
        .nodes
        .get(kind)
        .ok_or_else(|| GraphError::kind_not_found(kind))?;

    let validated = node_kind
        .schema
        .validate(&props)
        .map_err(GraphError::validation)?;

    if let Some(existing) = ctx.backend.get_node(ctx.graph_id(), kind, id).await? {
        if existing.meta.is_live() {
            return Err(GraphError::validation_msg("id", "Node already exists"));
        }
    }

    for disjoint_kind in ctx.registry.get_disjoint_kinds(kind) {
        if let Some(other) = ctx.backend.get_node(ctx.graph_id(), &disjoint_kind, id).await? {
            if other.meta.is_live() {
                return Err(GraphError::validation_msg(
                    "id",
                    format!("'{kind}' is disjoint with '{disjoint_kind}', which already has a live node '{id}'"),
                ));
            }
        }
    }

    let to_insert = check_uniqueness_precreate(ctx, kind, &validated).await?;

    let now = ctx.now();
    let row = ctx
        .backend
        .insert_node(
            ctx.graph_id(),
            NewNodeRow {
                kind: kind.to_string(),
                id: id.to_string(),
                valid_from,
                valid_to,
                props: validated.clone(),
                now,
            },
        )
        .await?;

    for (bucket_kind, constraint_name, key) in to_insert {
        ctx.backend
            .insert_unique(ctx.graph_id(), &bucket_kind, &constraint_name, &key, id)
            .await?;
    }
    sync_embeddings(ctx, kind, id, &validated).await?;

    debug!(id, "node created");
    Ok(row.into())
}

#[instrument(skip(ctx, props), fields(graph_id = ctx.graph_id(), kind))]
pub async fn create_node(
    ctx: &PipelineContext,
    kind: &str,
    props: serde_json::Value,
    input: CreateNodeInput,
) -> Result<NodeInstance> {
    let id = input.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let envelope = new_envelope(OperationKind::CreateNode, "node", kind, &id, ctx.graph_id(), ctx.now());
    run_with_envelope(&ctx.hooks, envelope, || ctx.now(), async {
        create_node_inner(ctx, kind, &id, props, input.valid_from, input.valid_to).await
    })
    .await
}

pub async fn get_node(ctx: &PipelineContext, kind: &str, id: &str) -> Result<Option<NodeInstance>> {
    let row = ctx.backend.get_node(ctx.graph_id(), kind, id).await?;
    Ok(row.map(Into::into))
}

pub(super) async fn update_node_inner(
    ctx: &PipelineContext,
    kind: &str,
    id: &str,
    patch: serde_json::Value,
    clear_deleted: bool,
) -> Result<NodeInstance> {
    let node_kind = ctx
        .def
        .nodes
        .get(kind)
        .ok_or_else(|| GraphError::kind_not_found(kind))?;

    let existing = ctx
        .backend
        .get_node(ctx.graph_id(), kind, id)
        .await?
        .ok_or_else(|| GraphError::node_not_found(kind, id))?;

    if !existing.meta.is_live() && !clear_deleted {
        return Err(GraphError::node_not_found(kind, id));
    }

    let mut merged = existing.props.clone();
    if let (Some(merged_obj), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
        for (k, v) in patch_obj {
            merged_obj.insert(k.clone(), v.clone());
        }
    }
    let validated = node_kind.schema.validate(&merged).map_err(GraphError::validation)?;

    // Uniqueness is rechecked on update (changed fields may now collide);
    // cardinality is not, since cardinality is purely an edge-count concern.
    for scoped in applicable_constraints(&ctx.def, &ctx.registry, kind) {
        let old_key = compute_key(&scoped.constraint, &existing.props);
        let new_key = compute_key(&scoped.constraint, &validated);
        if old_key == new_key {
            continue;
        }
        if let Some(new_key) = &new_key {
            if let Some(existing_id) = ctx
                .backend
                .check_unique(ctx.graph_id(), &scoped.bucket_kind, &scoped.constraint.name, new_key)
                .await?
            {
                if existing_id != id {
                    return Err(GraphError::uniqueness(scoped.bucket_kind.clone(), scoped.constraint.name.clone(), existing_id));
                }
            }
        }
        if let Some(old_key) = &old_key {
            ctx.backend
                .delete_unique(ctx.graph_id(), &scoped.bucket_kind, &scoped.constraint.name, old_key)
                .await?;
        }
        if let Some(new_key) = &new_key {
            ctx.backend
                .insert_unique(ctx.graph_id(), &scoped.bucket_kind, &scoped.constraint.name, new_key, id)
                .await?;
        }
    }

    let now = ctx.now();
    let row = ctx
        .backend
        .update_node(ctx.graph_id(), kind, id, validated.clone(), clear_deleted, now)
        .await?;
    sync_embeddings(ctx, kind, id, &validated).await?;

    debug!(id, "node updated");
    Ok(row.into())
}

#[instrument(skip(ctx, patch), fields(graph_id = ctx.graph_id(), kind, id))]
pub async fn update_node(
    ctx: &PipelineContext,
    kind: &str,
    id: &str,
    patch: serde_json::Value,
) -> Result<NodeInstance> {
    update_node_with(ctx, kind, id, patch, false).await
}

/// Like [`update_node`], but `clear_deleted` lets a caller reinstate a
/// soft-deleted node by clearing `deletedAt` as part of the same update
/// instead of failing `NodeNotFoundError` (`spec.md` §4.F.3).
#[instrument(skip(ctx, patch), fields(graph_id = ctx.graph_id(), kind, id))]
pub async fn update_node_with(
    ctx: &PipelineContext,
    kind: &str,
    id: &str,
    patch: serde_json::Value,
    clear_deleted: bool,
) -> Result<NodeInstance> {
    let envelope = new_envelope(OperationKind::UpdateNode, "node", kind, id, ctx.graph_id(), ctx.now());
    run_with_envelope(&ctx.hooks, envelope, || ctx.now(), async {
        update_node_inner(ctx, kind, id, patch, clear_deleted).await
    })
    .await
}

async fn delete_node_inner(ctx: &PipelineContext, kind: &str, id: &str) -> Result<()> {
    let node_kind = ctx
        .def
        .nodes
        .get(kind)
        .ok_or_else(|| GraphError::kind_not_found(kind))?;

    let existing = match ctx.backend.get_node(ctx.graph_id(), kind, id).await? {
        Some(existing) if existing.meta.is_live() => existing,
        // Missing or already soft-deleted: silent no-op (`spec.md` §7).
        _ => return Ok(()),
    };

    let connected = ctx.backend.find_edges_connected_to(ctx.graph_id(), kind, id).await?;
    let live: Vec<_> = connected.into_iter().filter(|e| e.meta.is_live()).collect();

    match node_kind.on_delete {
        DeleteBehavior::Restrict if !live.is_empty() => {
            let mut edge_kinds: Vec<String> = live.iter().map(|e| e.kind.clone()).collect();
            edge_kinds.sort();
            edge_kinds.dedup();
            return Err(GraphError::restricted_delete(kind, id, edge_kinds, live.len()));
        }
        DeleteBehavior::Restrict => {}
        DeleteBehavior::Cascade => {
            let now = ctx.now();
            for edge in &live {
                ctx.backend.soft_delete_edge(ctx.graph_id(), &edge.kind, &edge.id, now).await?;
            }
        }
        DeleteBehavior::Disconnect => {
            for edge in &live {
                ctx.backend.hard_delete_edge(ctx.graph_id(), &edge.kind, &edge.id).await?;
            }
        }
    }

    let now = ctx.now();
    ctx.backend.soft_delete_node(ctx.graph_id(), kind, id, now).await?;

    // Soft-deleting frees the (kind, key) slot and retires the node's
    // embeddings so it no longer surfaces in similarity search.
    for scoped in applicable_constraints(&ctx.def, &ctx.registry, kind) {
        if let Some(key) = compute_key(&scoped.constraint, &existing.props) {
            ctx.backend
                .delete_unique(ctx.graph_id(), &scoped.bucket_kind, &scoped.constraint.name, &key)
                .await?;
        }
    }
    for (field, _) in node_kind.schema.embedding_fields() {
        ctx.backend
            .delete_embedding(EmbeddingKey {
                graph_id: ctx.graph_id().to_string(),
                kind: kind.to_string(),
                id: id.to_string(),
                field_path: field,
            })
            .await?;
    }

    debug!(id, "node soft-deleted");
    Ok(())
}

/// Soft-delete a node, applying its kind's `onDelete` behavior to live
/// connected edges. Restrict aborts if any live edges remain; cascade
/// soft-deletes the connected edges; disconnect hard-deletes them
/// (`spec.md` §9 Open Questions).
#[instrument(skip(ctx), fields(graph_id = ctx.graph_id(), kind, id))]
pub async fn delete_node(ctx: &PipelineContext, kind: &str, id: &str) -> Result<()> {
    let envelope = new_envelope(OperationKind::DeleteNode, "node", kind, id, ctx.graph_id(), ctx.now());
    run_with_envelope(&ctx.hooks, envelope, || ctx.now(), delete_node_inner(ctx, kind, id)).await
}

async fn hard_delete_node_inner(ctx: &PipelineContext, kind: &str, id: &str) -> Result<()> {
    // Missing-target deletes are silent no-ops (`spec.md` §7). Unlike the
    // soft-delete path, an already soft-deleted row is still a valid target
    // here since hard-deleting it is the only way to purge a tombstone.
    let existing = match ctx.backend.get_node(ctx.graph_id(), kind, id).await? {
        Some(existing) => existing,
        None => return Ok(()),
    };

    for scoped in applicable_constraints(&ctx.def, &ctx.registry, kind) {
        if let Some(key) = compute_key(&scoped.constraint, &existing.props) {
            ctx.backend
                .delete_unique(ctx.graph_id(), &scoped.bucket_kind, &scoped.constraint.name, &key)
                .await?;
        }
    }
    if let Some(node_kind) = ctx.def.nodes.get(kind) {
        for (field, _) in node_kind.schema.embedding_fields() {
            ctx.backend
                .delete_embedding(EmbeddingKey {
                    graph_id: ctx.graph_id().to_string(),
                    kind: kind.to_string(),
                    id: id.to_string(),
                    field_path: field,
                })
                .await?;
        }
    }
    ctx.backend.hard_delete_node(ctx.graph_id(), kind, id).await?;
    debug!(id, "node hard-deleted");
    Ok(())
}

/// Irreversibly remove a node's row, cleaning up its uniqueness index
/// entries and embedding vectors first (`spec.md` §9 Open Questions).
#[instrument(skip(ctx), fields(graph_id = ctx.graph_id(), kind, id))]
pub async fn hard_delete_node(ctx: &PipelineContext, kind: &str, id: &str) -> Result<()> {
    let envelope = new_envelope(OperationKind::DeleteNode, "node", kind, id, ctx.graph_id(), ctx.now());
    run_with_envelope(&ctx.hooks, envelope, || ctx.now(), hard_delete_node_inner(ctx, kind, id)).await
}
