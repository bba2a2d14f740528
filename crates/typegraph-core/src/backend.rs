//! The backend contract (§6, "Backend contract (consumed)").
//!
//! The core depends on this abstraction only; concrete relational drivers
//! (SQLite, Postgres, ...) are external collaborators and out of scope here
//! (`spec.md` §1). [`typegraph_backend::MemoryBackend`] (a separate crate)
//! is the reference implementation used for tests and embedding.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-instance versioned metadata (node flavor: carries `version`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeMetadata {
    pub version: u64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl NodeMetadata {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Temporal validity at instant `at`. Absent bounds mean unbounded.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        let after_start = self.valid_from.map(|f| f <= at).unwrap_or(true);
        let before_end = self.valid_to.map(|t| at < t).unwrap_or(true);
        after_start && before_end
    }
}

/// Instance metadata without `version` (edge flavor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeMetadata {
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EdgeMetadata {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        let after_start = self.valid_from.map(|f| f <= at).unwrap_or(true);
        let before_end = self.valid_to.map(|t| at < t).unwrap_or(true);
        after_start && before_end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRow {
    pub kind: String,
    pub id: String,
    pub meta: NodeMetadata,
    pub props: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRow {
    pub id: String,
    pub kind: String,
    pub from_kind: String,
    pub from_id: String,
    pub to_kind: String,
    pub to_id: String,
    pub meta: EdgeMetadata,
    pub props: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewNodeRow {
    pub kind: String,
    pub id: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub props: serde_json::Value,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEdgeRow {
    pub id: String,
    pub kind: String,
    pub from_kind: String,
    pub from_id: String,
    pub to_kind: String,
    pub to_id: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub props: serde_json::Value,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersionRow {
    pub graph_id: String,
    pub version: u64,
    pub hash: String,
    pub document: serde_json::Value,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackendCapabilities {
    pub transactions: bool,
}

/// Which kinds of row an embedding field is keyed against.
#[derive(Debug, Clone)]
pub struct EmbeddingKey {
    pub graph_id: String,
    pub kind: String,
    pub id: String,
    pub field_path: String,
}

/// The backend abstraction the write pipeline and schema manager consume.
///
/// Every operation accepts a `graph_id` (`spec.md` §6). Implementations may
/// suspend at any call (§5 "Suspension points").
#[async_trait]
pub trait Backend: Send + Sync {
    fn dialect(&self) -> &str;
    fn capabilities(&self) -> BackendCapabilities;

    /// Begin a transaction, returning a scoped backend handle whose writes
    /// are only visible to callers holding that handle until `commit`.
    async fn begin_transaction(&self) -> Result<Arc<dyn Backend>>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;

    // -- nodes --
    async fn insert_node(&self, graph_id: &str, row: NewNodeRow) -> Result<NodeRow>;
    async fn update_node(
        &self,
        graph_id: &str,
        kind: &str,
        id: &str,
        props: serde_json::Value,
        clear_deleted: bool,
        now: DateTime<Utc>,
    ) -> Result<NodeRow>;
    async fn soft_delete_node(&self, graph_id: &str, kind: &str, id: &str, now: DateTime<Utc>) -> Result<()>;
    async fn hard_delete_node(&self, graph_id: &str, kind: &str, id: &str) -> Result<()>;
    async fn get_node(&self, graph_id: &str, kind: &str, id: &str) -> Result<Option<NodeRow>>;
    async fn get_nodes(&self, graph_id: &str, ids: &[(String, String)]) -> Result<Vec<NodeRow>>;
    async fn find_nodes_by_kind(&self, graph_id: &str, kind: &str, include_deleted: bool) -> Result<Vec<NodeRow>>;
    async fn count_nodes_by_kind(&self, graph_id: &str, kind: &str) -> Result<usize>;

    // -- edges --
    async fn insert_edge(&self, graph_id: &str, row: NewEdgeRow) -> Result<EdgeRow>;
    async fn update_edge(
        &self,
        graph_id: &str,
        kind: &str,
        id: &str,
        props: serde_json::Value,
        clear_deleted: bool,
        now: DateTime<Utc>,
    ) -> Result<EdgeRow>;
    async fn soft_delete_edge(&self, graph_id: &str, kind: &str, id: &str, now: DateTime<Utc>) -> Result<()>;
    async fn hard_delete_edge(&self, graph_id: &str, kind: &str, id: &str) -> Result<()>;
    async fn get_edge(&self, graph_id: &str, kind: &str, id: &str) -> Result<Option<EdgeRow>>;
    async fn get_edges(&self, graph_id: &str, ids: &[(String, String)]) -> Result<Vec<EdgeRow>>;
    async fn count_edges_from(
        &self,
        graph_id: &str,
        edge_kind: &str,
        from_kind: &str,
        from_id: &str,
        active_only: bool,
    ) -> Result<usize>;
    async fn edge_exists_between(
        &self,
        graph_id: &str,
        edge_kind: &str,
        from_kind: &str,
        from_id: &str,
        to_kind: &str,
        to_id: &str,
    ) -> Result<bool>;
    async fn find_edges_connected_to(&self, graph_id: &str, kind: &str, id: &str) -> Result<Vec<EdgeRow>>;
    async fn find_edges_by_kind(&self, graph_id: &str, edge_kind: &str, include_deleted: bool) -> Result<Vec<EdgeRow>>;

    // -- uniqueness --
    async fn check_unique(
        &self,
        graph_id: &str,
        kind: &str,
        constraint: &str,
        key: &str,
    ) -> Result<Option<String>>;
    async fn insert_unique(
        &self,
        graph_id: &str,
        kind: &str,
        constraint: &str,
        key: &str,
        node_id: &str,
    ) -> Result<()>;
    async fn delete_unique(&self, graph_id: &str, kind: &str, constraint: &str, key: &str) -> Result<()>;
    async fn find_by_constraint(
        &self,
        graph_id: &str,
        kind: &str,
        constraint: &str,
        key: &str,
    ) -> Result<Option<NodeRow>>;

    // -- embeddings --
    async fn upsert_embedding(&self, key: EmbeddingKey, vector: Vec<f32>) -> Result<()>;
    async fn delete_embedding(&self, key: EmbeddingKey) -> Result<()>;

    // -- schema --
    async fn get_active_schema(&self, graph_id: &str) -> Result<Option<SchemaVersionRow>>;
    async fn get_schema_version(&self, graph_id: &str, version: u64) -> Result<Option<SchemaVersionRow>>;
    async fn insert_schema(&self, row: SchemaVersionRow) -> Result<()>;
    async fn set_active_schema(&self, graph_id: &str, version: u64) -> Result<()>;

    // -- bulk --
    async fn clear_graph(&self, graph_id: &str) -> Result<()>;
}

/// Run `f` inside a transaction on `backend`: commit on `Ok`, rollback on
/// `Err`. Mirrors `spec.md` §5 "Transactions": "Commit happens when the user
/// function returns; rollback on any thrown error."
pub async fn with_transaction<F, Fut, T>(backend: &Arc<dyn Backend>, f: F) -> Result<T>
where
    F: FnOnce(Arc<dyn Backend>) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    if !backend.capabilities().transactions {
        return f(backend.clone()).await;
    }
    let tx = backend.begin_transaction().await?;
    match f(tx.clone()).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            let _ = tx.rollback().await;
            Err(err)
        }
    }
}
