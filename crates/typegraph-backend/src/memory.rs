//! The in-memory reference backend.
//!
//! A SQL driver (SQLite, Postgres, ...) is the natural production backend
//! for this contract, but shipping one is out of scope here; this backend
//! exists so the core engine and its tests have a concrete, dependency-free
//! collaborator. It stores everything behind one `RwLock` per graph and
//! does not implement real transaction isolation: `capabilities().transactions`
//! is `false`, so [`typegraph_core::with_transaction`] simply runs the
//! closure directly against this backend instead of opening a scope.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use typegraph_core::{
    Backend, BackendCapabilities, EdgeMetadata, EdgeRow, EmbeddingKey, NewEdgeRow, NewNodeRow,
    NodeMetadata, NodeRow, Result, SchemaVersionRow,
};

use crate::error::MemoryBackendError;

type NodeKey = (String, String);
type EdgeKey = (String, String);
type UniqueKey = (String, String, String);
type EmbeddingStoreKey = (String, String, String);

#[derive(Default)]
struct GraphStore {
    nodes: HashMap<NodeKey, NodeRow>,
    edges: HashMap<EdgeKey, EdgeRow>,
    unique_index: HashMap<UniqueKey, String>,
    embeddings: HashMap<EmbeddingStoreKey, Vec<f32>>,
    schema_versions: HashMap<u64, SchemaVersionRow>,
    active_schema_version: Option<u64>,
}

/// An in-memory, process-local [`Backend`]. Cheap to clone: every clone
/// shares the same underlying store via `Arc`.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    graphs: Arc<RwLock<HashMap<String, Arc<RwLock<GraphStore>>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    async fn graph(&self, graph_id: &str) -> Arc<RwLock<GraphStore>> {
        {
            let graphs = self.graphs.read().await;
            if let Some(store) = graphs.get(graph_id) {
                return store.clone();
            }
        }
        let mut graphs = self.graphs.write().await;
        graphs
            .entry(graph_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(GraphStore::default())))
            .clone()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn dialect(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities { transactions: false }
    }

    async fn begin_transaction(&self) -> Result<Arc<dyn Backend>> {
        Ok(Arc::new(self.clone()))
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_node(&self, graph_id: &str, row: NewNodeRow) -> Result<NodeRow> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        let meta = NodeMetadata {
            version: 1,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            created_at: row.now,
            updated_at: row.now,
            deleted_at: None,
        };
        let node = NodeRow {
            kind: row.kind.clone(),
            id: row.id.clone(),
            meta,
            props: row.props,
        };
        store.nodes.insert((row.kind, row.id), node.clone());
        Ok(node)
    }

    async fn update_node(
        &self,
        graph_id: &str,
        kind: &str,
        id: &str,
        props: serde_json::Value,
        clear_deleted: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<NodeRow> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        let node = store
            .nodes
            .get_mut(&(kind.to_string(), id.to_string()))
            .ok_or_else(|| typegraph_core::GraphError::node_not_found(kind, id))?;
        node.props = props;
        node.meta.version += 1;
        node.meta.updated_at = now;
        if clear_deleted {
            node.meta.deleted_at = None;
        }
        Ok(node.clone())
    }

    async fn soft_delete_node(&self, graph_id: &str, kind: &str, id: &str, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        let node = store
            .nodes
            .get_mut(&(kind.to_string(), id.to_string()))
            .ok_or_else(|| typegraph_core::GraphError::node_not_found(kind, id))?;
        node.meta.deleted_at = Some(now);
        node.meta.updated_at = now;
        Ok(())
    }

    async fn hard_delete_node(&self, graph_id: &str, kind: &str, id: &str) -> Result<()> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        store.nodes.remove(&(kind.to_string(), id.to_string()));
        Ok(())
    }

    async fn get_node(&self, graph_id: &str, kind: &str, id: &str) -> Result<Option<NodeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store.nodes.get(&(kind.to_string(), id.to_string())).cloned())
    }

    async fn get_nodes(&self, graph_id: &str, ids: &[(String, String)]) -> Result<Vec<NodeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(ids.iter().filter_map(|k| store.nodes.get(k).cloned()).collect())
    }

    async fn find_nodes_by_kind(&self, graph_id: &str, kind: &str, include_deleted: bool) -> Result<Vec<NodeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store
            .nodes
            .values()
            .filter(|n| n.kind == kind && (include_deleted || n.meta.is_live()))
            .cloned()
            .collect())
    }

    async fn count_nodes_by_kind(&self, graph_id: &str, kind: &str) -> Result<usize> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store.nodes.values().filter(|n| n.kind == kind && n.meta.is_live()).count())
    }

    async fn insert_edge(&self, graph_id: &str, row: NewEdgeRow) -> Result<EdgeRow> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        let meta = EdgeMetadata {
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            created_at: row.now,
            updated_at: row.now,
            deleted_at: None,
        };
        let edge = EdgeRow {
            id: row.id.clone(),
            kind: row.kind.clone(),
            from_kind: row.from_kind,
            from_id: row.from_id,
            to_kind: row.to_kind,
            to_id: row.to_id,
            meta,
            props: row.props,
        };
        store.edges.insert((row.kind, row.id), edge.clone());
        Ok(edge)
    }

    async fn update_edge(
        &self,
        graph_id: &str,
        kind: &str,
        id: &str,
        props: serde_json::Value,
        clear_deleted: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<EdgeRow> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        let edge = store
            .edges
            .get_mut(&(kind.to_string(), id.to_string()))
            .ok_or_else(|| typegraph_core::GraphError::edge_not_found(kind, id))?;
        edge.props = props;
        edge.meta.updated_at = now;
        if clear_deleted {
            edge.meta.deleted_at = None;
        }
        Ok(edge.clone())
    }

    async fn soft_delete_edge(&self, graph_id: &str, kind: &str, id: &str, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        let edge = store
            .edges
            .get_mut(&(kind.to_string(), id.to_string()))
            .ok_or_else(|| typegraph_core::GraphError::edge_not_found(kind, id))?;
        edge.meta.deleted_at = Some(now);
        edge.meta.updated_at = now;
        Ok(())
    }

    async fn hard_delete_edge(&self, graph_id: &str, kind: &str, id: &str) -> Result<()> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        store.edges.remove(&(kind.to_string(), id.to_string()));
        Ok(())
    }

    async fn get_edge(&self, graph_id: &str, kind: &str, id: &str) -> Result<Option<EdgeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store.edges.get(&(kind.to_string(), id.to_string())).cloned())
    }

    async fn get_edges(&self, graph_id: &str, ids: &[(String, String)]) -> Result<Vec<EdgeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(ids.iter().filter_map(|k| store.edges.get(k).cloned()).collect())
    }

    async fn count_edges_from(
        &self,
        graph_id: &str,
        edge_kind: &str,
        from_kind: &str,
        from_id: &str,
        active_only: bool,
    ) -> Result<usize> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store
            .edges
            .values()
            .filter(|e| {
                e.kind == edge_kind
                    && e.from_kind == from_kind
                    && e.from_id == from_id
                    && (!active_only || e.meta.is_live())
            })
            .count())
    }

    async fn edge_exists_between(
        &self,
        graph_id: &str,
        edge_kind: &str,
        from_kind: &str,
        from_id: &str,
        to_kind: &str,
        to_id: &str,
    ) -> Result<bool> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store.edges.values().any(|e| {
            e.kind == edge_kind
                && e.from_kind == from_kind
                && e.from_id == from_id
                && e.to_kind == to_kind
                && e.to_id == to_id
                && e.meta.is_live()
        }))
    }

    async fn find_edges_connected_to(&self, graph_id: &str, kind: &str, id: &str) -> Result<Vec<EdgeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store
            .edges
            .values()
            .filter(|e| (e.from_kind == kind && e.from_id == id) || (e.to_kind == kind && e.to_id == id))
            .cloned()
            .collect())
    }

    async fn find_edges_by_kind(&self, graph_id: &str, edge_kind: &str, include_deleted: bool) -> Result<Vec<EdgeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store
            .edges
            .values()
            .filter(|e| e.kind == edge_kind && (include_deleted || e.meta.is_live()))
            .cloned()
            .collect())
    }

    async fn check_unique(&self, graph_id: &str, kind: &str, constraint: &str, key: &str) -> Result<Option<String>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store
            .unique_index
            .get(&(kind.to_string(), constraint.to_string(), key.to_string()))
            .cloned())
    }

    async fn insert_unique(&self, graph_id: &str, kind: &str, constraint: &str, key: &str, node_id: &str) -> Result<()> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        store
            .unique_index
            .insert((kind.to_string(), constraint.to_string(), key.to_string()), node_id.to_string());
        Ok(())
    }

    async fn delete_unique(&self, graph_id: &str, kind: &str, constraint: &str, key: &str) -> Result<()> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        store
            .unique_index
            .remove(&(kind.to_string(), constraint.to_string(), key.to_string()));
        Ok(())
    }

    async fn find_by_constraint(&self, graph_id: &str, kind: &str, constraint: &str, key: &str) -> Result<Option<NodeRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        let Some(node_id) = store
            .unique_index
            .get(&(kind.to_string(), constraint.to_string(), key.to_string()))
        else {
            return Ok(None);
        };
        Ok(store.nodes.get(&(kind.to_string(), node_id.clone())).cloned())
    }

    async fn upsert_embedding(&self, key: EmbeddingKey, vector: Vec<f32>) -> Result<()> {
        let store = self.graph(&key.graph_id).await;
        let mut store = store.write().await;
        store.embeddings.insert((key.kind, key.id, key.field_path), vector);
        Ok(())
    }

    async fn delete_embedding(&self, key: EmbeddingKey) -> Result<()> {
        let store = self.graph(&key.graph_id).await;
        let mut store = store.write().await;
        store.embeddings.remove(&(key.kind, key.id, key.field_path));
        Ok(())
    }

    async fn get_active_schema(&self, graph_id: &str) -> Result<Option<SchemaVersionRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store
            .active_schema_version
            .and_then(|v| store.schema_versions.get(&v))
            .cloned())
    }

    async fn get_schema_version(&self, graph_id: &str, version: u64) -> Result<Option<SchemaVersionRow>> {
        let store = self.graph(graph_id).await;
        let store = store.read().await;
        Ok(store.schema_versions.get(&version).cloned())
    }

    async fn insert_schema(&self, row: SchemaVersionRow) -> Result<()> {
        let store = self.graph(&row.graph_id).await;
        let mut store = store.write().await;
        if row.is_active {
            store.active_schema_version = Some(row.version);
        }
        store.schema_versions.insert(row.version, row);
        Ok(())
    }

    async fn set_active_schema(&self, graph_id: &str, version: u64) -> Result<()> {
        let store = self.graph(graph_id).await;
        let mut store = store.write().await;
        if !store.schema_versions.contains_key(&version) {
            return Err(MemoryBackendError::graph_not_found(graph_id).into());
        }
        store.active_schema_version = Some(version);
        Ok(())
    }

    async fn clear_graph(&self, graph_id: &str) -> Result<()> {
        let mut graphs = self.graphs.write().await;
        graphs.insert(graph_id.to_string(), Arc::new(RwLock::new(GraphStore::default())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn now() -> chrono::DateTime<chrono::Utc> {
        Utc::now()
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert_node(
                "g1",
                NewNodeRow {
                    kind: "Person".to_string(),
                    id: "p1".to_string(),
                    valid_from: None,
                    valid_to: None,
                    props: serde_json::json!({"name": "Ada"}),
                    now: now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(row.meta.version, 1);

        let fetched = backend.get_node("g1", "Person", "p1").await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn soft_delete_keeps_row_but_marks_deleted() {
        let backend = MemoryBackend::new();
        backend
            .insert_node(
                "g1",
                NewNodeRow {
                    kind: "Person".to_string(),
                    id: "p1".to_string(),
                    valid_from: None,
                    valid_to: None,
                    props: serde_json::json!({}),
                    now: now(),
                },
            )
            .await
            .unwrap();
        backend.soft_delete_node("g1", "Person", "p1", now()).await.unwrap();
        let fetched = backend.get_node("g1", "Person", "p1").await.unwrap().unwrap();
        assert!(!fetched.meta.is_live());
    }

    #[tokio::test]
    async fn schema_rows_track_one_active_version() {
        let backend = MemoryBackend::new();
        backend
            .insert_schema(SchemaVersionRow {
                graph_id: "g1".to_string(),
                version: 1,
                hash: "abc".to_string(),
                document: serde_json::json!({}),
                is_active: true,
            })
            .await
            .unwrap();
        let active = backend.get_active_schema("g1").await.unwrap().unwrap();
        assert_eq!(active.version, 1);

        backend
            .insert_schema(SchemaVersionRow {
                graph_id: "g1".to_string(),
                version: 2,
                hash: "def".to_string(),
                document: serde_json::json!({}),
                is_active: false,
            })
            .await
            .unwrap();
        backend.set_active_schema("g1", 2).await.unwrap();
        let active = backend.get_active_schema("g1").await.unwrap().unwrap();
        assert_eq!(active.version, 2);
    }
}
