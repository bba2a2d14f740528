//! Per-kind collection runtime: a thin, kind-bound facade over the node/edge
//! pipeline functions, plus get-or-create helpers (`spec.md` §4.F).

use crate::error::{GraphError, Result};
use crate::instance::{EdgeInstance, NodeInstance};

use super::edge::{create_edge, update_edge, update_edge_with, CreateEdgeInput};
use super::node::{
    create_node, delete_node, get_node, hard_delete_node, update_node, update_node_with, CreateNodeInput,
};
use super::uniqueness::compute_key;
use super::PipelineContext;

/// What a `get_or_create_*` call actually did, surfaced to the caller so it
/// can tell a fresh insert apart from a match that was reused or reinstated
/// (`spec.md` line 200).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetOrCreateAction {
    Found,
    Updated,
    Resurrected,
    Created,
}

/// Whether a `get_or_create_*` call should leave a live match untouched
/// (`Skip`, the default) or merge `props` into it (`Update`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfExists {
    #[default]
    Skip,
    Update,
}

#[derive(Debug, Clone, Default)]
pub struct GetOrCreateEdgeOptions {
    /// Additional property fields, beyond the endpoints, that must also
    /// match for an existing edge to count as the same one.
    pub match_on: Vec<String>,
    pub if_exists: IfExists,
}

/// A node kind bound to a context, for call sites that repeatedly operate
/// on one kind (mirrors how most consumers actually use the engine: "the
/// `Person` collection", not raw `kind: &str` everywhere).
pub struct Collection<'a> {
    ctx: &'a PipelineContext,
    kind: String,
}

impl<'a> Collection<'a> {
    pub fn new(ctx: &'a PipelineContext, kind: impl Into<String>) -> Self {
        Self { ctx, kind: kind.into() }
    }

    pub async fn create(&self, props: serde_json::Value, input: CreateNodeInput) -> Result<NodeInstance> {
        create_node(self.ctx, &self.kind, props, input).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<NodeInstance>> {
        get_node(self.ctx, &self.kind, id).await
    }

    pub async fn update(&self, id: &str, patch: serde_json::Value) -> Result<NodeInstance> {
        update_node(self.ctx, &self.kind, id, patch).await
    }

    /// Like [`Collection::update`], but reinstates a soft-deleted node
    /// instead of failing `NodeNotFoundError` when `clear_deleted` is set.
    pub async fn update_with(&self, id: &str, patch: serde_json::Value, clear_deleted: bool) -> Result<NodeInstance> {
        update_node_with(self.ctx, &self.kind, id, patch, clear_deleted).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        delete_node(self.ctx, &self.kind, id).await
    }

    pub async fn hard_delete(&self, id: &str) -> Result<()> {
        hard_delete_node(self.ctx, &self.kind, id).await
    }

    /// Look a node up by one of its kind's named uniqueness constraints. A
    /// live match is either returned as-is or merged into, per `if_exists`;
    /// a soft-deleted match is resurrected (`clearDeleted`); otherwise a
    /// fresh node is created from `props` (`spec.md` line 200).
    ///
    /// A live match comes from the backend's uniqueness index directly, but
    /// soft-deleting purges that index (so the slot can be reused), so a
    /// soft-deleted match can't be found that way. Finding one to resurrect
    /// falls back to scanning this kind's rows (including deleted ones) and
    /// recomputing the constraint's key in-process, since only the core
    /// (not the backend) knows the constraint's field list and collation.
    pub async fn get_or_create_by_constraint(
        &self,
        constraint_name: &str,
        props: serde_json::Value,
        if_exists: IfExists,
    ) -> Result<(NodeInstance, GetOrCreateAction)> {
        let node_kind = self
            .ctx
            .def
            .nodes
            .get(self.kind.as_str())
            .ok_or_else(|| GraphError::kind_not_found(self.kind.clone()))?;
        let constraint = node_kind
            .unique_constraints
            .iter()
            .find(|c| c.name == constraint_name)
            .ok_or_else(|| {
                GraphError::configuration(constraint_name, format!("no such constraint on kind '{}'", self.kind))
            })?
            .clone();
        let key = compute_key(&constraint, &props).ok_or_else(|| {
            GraphError::validation_msg(constraint_name, "props do not satisfy the constraint's predicate")
        })?;

        if let Some(existing) = self
            .ctx
            .backend
            .find_by_constraint(self.ctx.graph_id(), &self.kind, constraint_name, &key)
            .await?
        {
            return match if_exists {
                IfExists::Update => {
                    let updated = self.update(&existing.id, props).await?;
                    Ok((updated, GetOrCreateAction::Updated))
                }
                IfExists::Skip => Ok((existing.into(), GetOrCreateAction::Found)),
            };
        }

        let candidates = self
            .ctx
            .backend
            .find_nodes_by_kind(self.ctx.graph_id(), &self.kind, true)
            .await?;
        let resurrectable = candidates
            .into_iter()
            .find(|row| !row.meta.is_live() && compute_key(&constraint, &row.props).as_deref() == Some(key.as_str()));

        if let Some(deleted) = resurrectable {
            let resurrected = self.update_with(&deleted.id, props, true).await?;
            return Ok((resurrected, GetOrCreateAction::Resurrected));
        }

        let created = self.create(props, CreateNodeInput::default()).await?;
        Ok((created, GetOrCreateAction::Created))
    }
}

/// Find the edge between `(from_kind, from_id)` and `(to_kind, to_id)` of
/// the given kind (optionally also matching `options.match_on` property
/// fields), creating it with `props` if none exists. A live match is
/// returned as-is or merged into per `options.if_exists`; a soft-deleted
/// match is resurrected (`spec.md` line 200).
#[allow(clippy::too_many_arguments)]
pub async fn get_or_create_edge_by_endpoints(
    ctx: &PipelineContext,
    edge_kind: &str,
    from_kind: &str,
    from_id: &str,
    to_kind: &str,
    to_id: &str,
    props: serde_json::Value,
    options: GetOrCreateEdgeOptions,
) -> Result<(EdgeInstance, GetOrCreateAction)> {
    let connected = ctx.backend.find_edges_connected_to(ctx.graph_id(), from_kind, from_id).await?;
    let matches = |e: &crate::backend::EdgeRow| -> bool {
        e.kind == edge_kind
            && e.from_kind == from_kind
            && e.from_id == from_id
            && e.to_kind == to_kind
            && e.to_id == to_id
            && options.match_on.iter().all(|field| e.props.get(field) == props.get(field))
    };

    if let Some(existing) = connected.iter().find(|e| matches(e) && e.meta.is_live()) {
        return match options.if_exists {
            IfExists::Update => {
                let updated = update_edge(ctx, edge_kind, &existing.id, props).await?;
                Ok((updated, GetOrCreateAction::Updated))
            }
            IfExists::Skip => Ok((existing.clone().into(), GetOrCreateAction::Found)),
        };
    }

    if let Some(deleted) = connected.into_iter().find(|e| matches(e) && !e.meta.is_live()) {
        let resurrected = update_edge_with(ctx, edge_kind, &deleted.id, props, true).await?;
        return Ok((resurrected, GetOrCreateAction::Resurrected));
    }

    let created = create_edge(
        ctx,
        edge_kind,
        from_kind,
        from_id,
        to_kind,
        to_id,
        props,
        CreateEdgeInput::default(),
    )
    .await?;
    Ok((created, GetOrCreateAction::Created))
}
