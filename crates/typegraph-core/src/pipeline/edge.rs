//! Edge CRUD: endpoint-kind/existence validation and cardinality
//! prechecks (`spec.md` §4.F).

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::instance::EdgeInstance;
use crate::types::{Cardinality, EndpointExistence};

use super::envelope::{new_envelope, run_with_envelope, OperationKind};
use super::PipelineContext;

#[derive(Debug, Clone, Default)]
pub struct CreateEdgeInput {
    pub id: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

async fn check_endpoint(
    ctx: &PipelineContext,
    edge_kind: &str,
    endpoint: &'static str,
    kind: &str,
    id: &str,
    existence: EndpointExistence,
) -> Result<()> {
    let node = ctx.backend.get_node(ctx.graph_id(), kind, id).await?;
    let ok = match (&node, existence) {
        (None, _) => false,
        (Some(n), EndpointExistence::NotDeleted) => n.meta.is_live(),
        (Some(n), EndpointExistence::CurrentlyValid) => n.meta.is_live() && n.meta.is_valid_at(ctx.now()),
        (Some(_), EndpointExistence::Ever) => true,
    };
    if !ok {
        return Err(GraphError::endpoint_not_found(edge_kind, endpoint, kind, id));
    }
    Ok(())
}

fn check_endpoint_kind_allowed(
    ctx: &PipelineContext,
    declared: &std::collections::BTreeSet<crate::types::KindName>,
    actual_kind: &str,
) -> bool {
    declared
        .iter()
        .any(|k| ctx.registry.is_assignable_to(actual_kind, k.as_str()))
}

#[allow(clippy::too_many_arguments)]
pub(super) async fn check_cardinality(
    ctx: &PipelineContext,
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
            let count = ctx
                .backend
                .count_edges_from(ctx.graph_id(), edge_kind_name, from_kind, from_id, false)
                .await?;
            if count > 0 {
                return Err(GraphError::cardinality(edge_kind_name, "one", from_kind, from_id));
            }
            Ok(())
        }
        Cardinality::OneActive => {
            // Only applies to a new edge with no `validTo`; a historical or
            // backfilled edge is exempt (`spec.md` line 179).
            if valid_to.is_some() {
                return Ok(());
            }
            let count = ctx
                .backend
                .count_edges_from(ctx.graph_id(), edge_kind_name, from_kind, from_id, true)
                .await?;
            if count > 0 {
                return Err(GraphError::cardinality(edge_kind_name, "oneActive", from_kind, from_id));
            }
            Ok(())
        }
        Cardinality::Unique => {
            let exists = ctx
                .backend
                .edge_exists_between(ctx.graph_id(), edge_kind_name, from_kind, from_id, to_kind, to_id)
                .await?;
            if exists {
                return Err(GraphError::cardinality(edge_kind_name, "unique", from_kind, from_id));
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) async fn create_edge_inner(
    ctx: &PipelineContext,
    edge_kind: &str,
    id: &str,
    from_kind: &str,
    from_id: &str,
    to_kind: &str,
    to_id: &str,
    props: serde_json::Value,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
) -> Result<EdgeInstance> {
    let kind_def = ctx
        .def
        .edges
        .get(edge_kind)
        .ok_or_else(|| GraphError::kind_not_found(edge_kind))?;

    if !check_endpoint_kind_allowed(ctx, &kind_def.from_kinds, from_kind) {
        return Err(GraphError::validation_msg(
            "fromKind",
            format!("'{from_kind}' is not an allowed source kind for edge '{edge_kind}'"),
        ));
    }
    if !check_endpoint_kind_allowed(ctx, &kind_def.to_kinds, to_kind) {
        return Err(GraphError::validation_msg(
            "toKind",
            format!("'{to_kind}' is not an allowed target kind for edge '{edge_kind}'"),
        ));
    }

    check_endpoint(ctx, edge_kind, "from", from_kind, from_id, kind_def.endpoint_existence).await?;
    check_endpoint(ctx, edge_kind, "to", to_kind, to_id, kind_def.endpoint_existence).await?;

    let validated = kind_def.schema.validate(&props).map_err(GraphError::validation)?;

    check_cardinality(
        ctx,
        edge_kind,
        kind_def.cardinality,
        from_kind,
        from_id,
        to_kind,
        to_id,
        valid_to,
    )
    .await?;

    let now = ctx.now();
    let row = ctx
        .backend
        .insert_edge(
            ctx.graph_id(),
            crate::backend::NewEdgeRow {
                id: id.to_string(),
                kind: edge_kind.to_string(),
                from_kind: from_kind.to_string(),
                from_id: from_id.to_string(),
                to_kind: to_kind.to_string(),
                to_id: to_id.to_string(),
                valid_from,
                valid_to,
                props: validated,
                now,
            },
        )
        .await?;

    debug!(id, "edge created");
    Ok(row.into())
}

#[instrument(skip(ctx, props), fields(graph_id = ctx.graph_id(), edge_kind))]
#[allow(clippy::too_many_arguments)]
pub async fn create_edge(
    ctx: &PipelineContext,
    edge_kind: &str,
    from_kind: &str,
    from_id: &str,
    to_kind: &str,
    to_id: &str,
    props: serde_json::Value,
    input: CreateEdgeInput,
) -> Result<EdgeInstance> {
    let id = input.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let envelope = new_envelope(OperationKind::CreateEdge, "edge", edge_kind, &id, ctx.graph_id(), ctx.now());
    run_with_envelope(&ctx.hooks, envelope, || ctx.now(), async {
        create_edge_inner(
            ctx,
            edge_kind,
            &id,
            from_kind,
            from_id,
            to_kind,
            to_id,
            props,
            input.valid_from,
            input.valid_to,
        )
        .await
    })
    .await
}

pub async fn get_edge(ctx: &PipelineContext, kind: &str, id: &str) -> Result<Option<EdgeInstance>> {
    let row = ctx.backend.get_edge(ctx.graph_id(), kind, id).await?;
    Ok(row.map(Into::into))
}

pub(super) async fn update_edge_inner(
    ctx: &PipelineContext,
    kind: &str,
    id: &str,
    patch: serde_json::Value,
    clear_deleted: bool,
) -> Result<EdgeInstance> {
    let kind_def = ctx
        .def
        .edges
        .get(kind)
        .ok_or_else(|| GraphError::kind_not_found(kind))?;

    let existing = ctx
        .backend
        .get_edge(ctx.graph_id(), kind, id)
        .await?
        .ok_or_else(|| GraphError::edge_not_found(kind, id))?;

    if !existing.meta.is_live() && !clear_deleted {
        return Err(GraphError::edge_not_found(kind, id));
    }

    let mut merged = existing.props.clone();
    if let (Some(merged_obj), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
        for (k, v) in patch_obj {
            merged_obj.insert(k.clone(), v.clone());
        }
    }
    let validated = kind_def.schema.validate(&merged).map_err(GraphError::validation)?;

    let now = ctx.now();
    let row = ctx
        .backend
        .update_edge(ctx.graph_id(), kind, id, validated, clear_deleted, now)
        .await?;
    debug!(id, "edge updated");
    Ok(row.into())
}

#[instrument(skip(ctx, patch), fields(graph_id = ctx.graph_id(), kind, id))]
pub async fn update_edge(
    ctx: &PipelineContext,
    kind: &str,
    id: &str,
    patch: serde_json::Value,
) -> Result<EdgeInstance> {
    update_edge_with(ctx, kind, id, patch, false).await
}

/// Like [`update_edge`], but `clear_deleted` lets a caller reinstate a
/// soft-deleted edge by clearing `deletedAt` as part of the same update,
/// the edge-side counterpart of `update_node_with`'s resurrection path.
#[instrument(skip(ctx, patch), fields(graph_id = ctx.graph_id(), kind, id))]
pub async fn update_edge_with(
    ctx: &PipelineContext,
    kind: &str,
    id: &str,
    patch: serde_json::Value,
    clear_deleted: bool,
) -> Result<EdgeInstance> {
    let envelope = new_envelope(OperationKind::UpdateEdge, "edge", kind, id, ctx.graph_id(), ctx.now());
    run_with_envelope(&ctx.hooks, envelope, || ctx.now(), async {
        update_edge_inner(ctx, kind, id, patch, clear_deleted).await
    })
    .await
}

async fn delete_edge_inner(ctx: &PipelineContext, kind: &str, id: &str, hard: bool) -> Result<()> {
    if hard {
        // A hard delete of an already-absent edge has nothing left to do.
        if ctx.backend.get_edge(ctx.graph_id(), kind, id).await?.is_none() {
            return Ok(());
        }
        ctx.backend.hard_delete_edge(ctx.graph_id(), kind, id).await?;
    } else {
        // Missing-target deletes are silent no-ops (`spec.md` §7).
        match ctx.backend.get_edge(ctx.graph_id(), kind, id).await? {
            Some(existing) if existing.meta.is_live() => {}
            _ => return Ok(()),
        }
        let now = ctx.now();
        ctx.backend.soft_delete_edge(ctx.graph_id(), kind, id, now).await?;
    }
    debug!(id, hard, "edge deleted");
    Ok(())
}

#[instrument(skip(ctx), fields(graph_id = ctx.graph_id(), kind, id))]
pub async fn delete_edge(ctx: &PipelineContext, kind: &str, id: &str, hard: bool) -> Result<()> {
    let envelope = new_envelope(OperationKind::DeleteEdge, "edge", kind, id, ctx.graph_id(), ctx.now());
    run_with_envelope(&ctx.hooks, envelope, || ctx.now(), delete_edge_inner(ctx, kind, id, hard)).await
}
