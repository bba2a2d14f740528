//! Import/export interchange (`spec.md` §4.F.8): a flat snapshot of every
//! node and edge instance in a graph, tombstones included, suitable for
//! moving a graph between backends or taking an offline backup.
//!
//! Export stamps the snapshot with a wire `formatVersion` and its `source`.
//! Import validates every row against the current kind registry, applies an
//! `onUnknownProperty` strategy to fields the schema doesn't declare, an
//! `idConflictStrategy` to rows that already exist, verifies edge endpoints
//! were actually restored before inserting the edge, processes rows in
//! configurable batches, and wraps the whole pass in a transaction when the
//! backend supports one. `createdAt`/`updatedAt` are reset to import time
//! (the backend contract has no "insert with an exact historical
//! timestamp" operation); `validFrom`/`validTo` are preserved exactly.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{with_transaction, NewEdgeRow, NewNodeRow};
use crate::error::{GraphError, Result};
use crate::instance::{EdgeInstance, NodeInstance};

use super::uniqueness::{applicable_constraints, compute_key};
use super::PipelineContext;

pub const FORMAT_VERSION: &str = "1.0";

/// Where an export snapshot came from, a discriminated union over three
/// literal values (`spec.md` line 226).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    TypegraphCloud,
    TypegraphExport,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphExport {
    pub format_version: String,
    pub graph_id: String,
    pub exported_at: String,
    pub source: Source,
    pub nodes: Vec<NodeInstance>,
    pub edges: Vec<EdgeInstance>,
}

pub async fn export_graph(ctx: &PipelineContext) -> Result<GraphExport> {
    let mut nodes = Vec::new();
    for kind in ctx.def.nodes.keys() {
        let rows = ctx
            .backend
            .find_nodes_by_kind(ctx.graph_id(), kind.as_str(), true)
            .await?;
        nodes.extend(rows.into_iter().map(Into::into));
    }

    let mut edges = Vec::new();
    for kind in ctx.def.edges.keys() {
        let rows = ctx
            .backend
            .find_edges_by_kind(ctx.graph_id(), kind.as_str(), true)
            .await?;
        edges.extend(rows.into_iter().map(Into::into));
    }

    info!(graph_id = ctx.graph_id(), nodes = nodes.len(), edges = edges.len(), "graph exported");

    Ok(GraphExport {
        format_version: FORMAT_VERSION.to_string(),
        graph_id: ctx.graph_id().to_string(),
        exported_at: ctx.now().to_rfc3339(),
        source: Source::TypegraphExport,
        nodes,
        edges,
    })
}

/// What to do with a property on an imported row that the kind's current
/// schema doesn't declare (`spec.md` §4.F.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnUnknownProperty {
    #[default]
    Error,
    Strip,
    Allow,
}

/// What to do with an imported row whose id already exists in the target
/// graph (`spec.md` §4.F.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStrategy {
    Skip,
    Update,
    #[default]
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub on_unknown_property: OnUnknownProperty,
    pub conflict_strategy: ConflictStrategy,
    pub batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            on_unknown_property: OnUnknownProperty::default(),
            conflict_strategy: ConflictStrategy::default(),
            batch_size: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub nodes_imported: usize,
    pub nodes_skipped: usize,
    pub edges_imported: usize,
    pub edges_skipped: usize,
    pub failed: Vec<(String, GraphError)>,
}

/// Strip, reject, or pass through properties not declared on `kind`'s
/// current schema, per `on_unknown_property`.
fn reconcile_unknown_properties(
    known: &[String],
    props: serde_json::Value,
    on_unknown_property: OnUnknownProperty,
) -> Result<serde_json::Value> {
    let Some(obj) = props.as_object() else {
        return Ok(props);
    };
    let unknown: Vec<&String> = obj.keys().filter(|k| !known.contains(k)).collect();
    if unknown.is_empty() {
        return Ok(props);
    }
    match on_unknown_property {
        OnUnknownProperty::Allow => Ok(props),
        OnUnknownProperty::Error => Err(GraphError::validation_msg(
            unknown[0].clone(),
            format!("unknown property '{}' not declared on this kind's schema", unknown[0]),
        )),
        OnUnknownProperty::Strip => {
            let mut obj = obj.clone();
            for key in unknown {
                obj.remove(key);
            }
            Ok(serde_json::Value::Object(obj))
        }
    }
}

async fn import_one_node(ctx: &PipelineContext, node: NodeInstance, options: ImportOptions, now: chrono::DateTime<chrono::Utc>) -> Result<bool> {
    let node_kind = ctx.def.nodes.get(node.kind.as_str()).ok_or_else(|| GraphError::kind_not_found(node.kind.clone()))?;
    let known = node_kind.schema.property_names();
    let props = reconcile_unknown_properties(&known, node.props, options.on_unknown_property)?;

    let existing = ctx.backend.get_node(ctx.graph_id(), &node.kind, &node.id).await?;
    if existing.is_some() {
        match options.conflict_strategy {
            ConflictStrategy::Skip => return Ok(false),
            ConflictStrategy::Error => {
                return Err(GraphError::validation_msg("id", format!("node '{}:{}' already exists", node.kind, node.id)));
            }
            ConflictStrategy::Update => {
                ctx.backend
                    .update_node(ctx.graph_id(), &node.kind, &node.id, props.clone(), node.deleted_at.is_none(), now)
                    .await?;
                if node.deleted_at.is_some() {
                    ctx.backend.soft_delete_node(ctx.graph_id(), &node.kind, &node.id, now).await?;
                }
                return Ok(true);
            }
        }
    }

    let row = ctx
        .backend
        .insert_node(
            ctx.graph_id(),
            NewNodeRow {
                kind: node.kind.clone(),
                id: node.id.clone(),
                valid_from: node.valid_from,
                valid_to: node.valid_to,
                props: props.clone(),
                now,
            },
        )
        .await?;
    if node.deleted_at.is_some() {
        ctx.backend.soft_delete_node(ctx.graph_id(), &row.kind, &row.id, now).await?;
    }
    for scoped in applicable_constraints(&ctx.def, &ctx.registry, &node.kind) {
        if let Some(key) = compute_key(&scoped.constraint, &props) {
            ctx.backend
                .insert_unique(ctx.graph_id(), &scoped.bucket_kind, &scoped.constraint.name, &key, &node.id)
                .await?;
        }
    }
    Ok(true)
}

async fn import_one_edge(ctx: &PipelineContext, edge: EdgeInstance, options: ImportOptions, now: chrono::DateTime<chrono::Utc>) -> Result<bool> {
    let edge_kind = ctx.def.edges.get(edge.kind.as_str()).ok_or_else(|| GraphError::kind_not_found(edge.kind.clone()))?;
    let known = edge_kind.schema.property_names();
    let props = reconcile_unknown_properties(&known, edge.props, options.on_unknown_property)?;

    if ctx.backend.get_node(ctx.graph_id(), &edge.from_kind, &edge.from_id).await?.is_none() {
        return Err(GraphError::endpoint_not_found(edge.kind.clone(), "from", edge.from_kind.clone(), edge.from_id.clone()));
    }
    if ctx.backend.get_node(ctx.graph_id(), &edge.to_kind, &edge.to_id).await?.is_none() {
        return Err(GraphError::endpoint_not_found(edge.kind.clone(), "to", edge.to_kind.clone(), edge.to_id.clone()));
    }

    let existing = ctx.backend.get_edge(ctx.graph_id(), &edge.kind, &edge.id).await?;
    if existing.is_some() {
        match options.conflict_strategy {
            ConflictStrategy::Skip => return Ok(false),
            ConflictStrategy::Error => {
                return Err(GraphError::validation_msg("id", format!("edge '{}:{}' already exists", edge.kind, edge.id)));
            }
            ConflictStrategy::Update => {
                ctx.backend
                    .update_edge(ctx.graph_id(), &edge.kind, &edge.id, props.clone(), edge.deleted_at.is_none(), now)
                    .await?;
                if edge.deleted_at.is_some() {
                    ctx.backend.soft_delete_edge(ctx.graph_id(), &edge.kind, &edge.id, now).await?;
                }
                return Ok(true);
            }
        }
    }

    let row = ctx
        .backend
        .insert_edge(
            ctx.graph_id(),
            NewEdgeRow {
                id: edge.id.clone(),
                kind: edge.kind.clone(),
                from_kind: edge.from_kind.clone(),
                from_id: edge.from_id.clone(),
                to_kind: edge.to_kind.clone(),
                to_id: edge.to_id.clone(),
                valid_from: edge.valid_from,
                valid_to: edge.valid_to,
                props,
                now,
            },
        )
        .await?;
    if edge.deleted_at.is_some() {
        ctx.backend.soft_delete_edge(ctx.graph_id(), &row.kind, &row.id, now).await?;
    }
    Ok(true)
}

pub async fn import_graph(ctx: &PipelineContext, export: GraphExport, options: ImportOptions) -> Result<ImportOutcome> {
    if export.format_version != FORMAT_VERSION {
        return Err(GraphError::validation_msg(
            "formatVersion",
            format!("unsupported export format version '{}'", export.format_version),
        ));
    }

    let outcome = with_transaction(&ctx.backend, |backend| {
        let ctx = ctx.on_backend(backend);
        async move {
            let now = ctx.now();
            let mut outcome = ImportOutcome::default();

            for chunk in export.nodes.chunks(options.batch_size.max(1)) {
                for node in chunk {
                    let label = format!("{}:{}", node.kind, node.id);
                    match import_one_node(&ctx, node.clone(), options, now).await {
                        Ok(true) => outcome.nodes_imported += 1,
                        Ok(false) => outcome.nodes_skipped += 1,
                        Err(e) => {
                            warn!(label, error = %e, "node import failed");
                            outcome.failed.push((label, e));
                        }
                    }
                }
            }

            for chunk in export.edges.chunks(options.batch_size.max(1)) {
                for edge in chunk {
                    let label = format!("{}:{}", edge.kind, edge.id);
                    match import_one_edge(&ctx, edge.clone(), options, now).await {
                        Ok(true) => outcome.edges_imported += 1,
                        Ok(false) => outcome.edges_skipped += 1,
                        Err(e) => {
                            warn!(label, error = %e, "edge import failed");
                            outcome.failed.push((label, e));
                        }
                    }
                }
            }

            Ok(outcome)
        }
    })
    .await?;

    info!(
        graph_id = ctx.graph_id(),
        nodes_imported = outcome.nodes_imported,
        edges_imported = outcome.edges_imported,
        failed = outcome.failed.len(),
        "graph imported"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_removes_undeclared_fields() {
        let known = vec!["name".to_string()];
        let props = json!({"name": "Ada", "legacyField": "x"});
        let out = reconcile_unknown_properties(&known, props, OnUnknownProperty::Strip).unwrap();
        assert_eq!(out, json!({"name": "Ada"}));
    }

    #[test]
    fn error_rejects_undeclared_fields() {
        let known = vec!["name".to_string()];
        let props = json!({"name": "Ada", "legacyField": "x"});
        assert!(reconcile_unknown_properties(&known, props, OnUnknownProperty::Error).is_err());
    }

    #[test]
    fn allow_passes_undeclared_fields_through() {
        let known = vec!["name".to_string()];
        let props = json!({"name": "Ada", "legacyField": "x"});
        let out = reconcile_unknown_properties(&known, props, OnUnknownProperty::Allow).unwrap();
        assert_eq!(out, json!({"name": "Ada", "legacyField": "x"}));
    }
}
