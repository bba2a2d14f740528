//! Backend error types.
//!
//! The in-memory backend raises its own narrow error set and converts it
//! into [`typegraph_core::GraphError::Database`] at the trait boundary, the
//! same wrapping a SQL driver would do for connection/constraint failures.

use thiserror::Error;

/// Errors that can occur within the in-memory backend itself.
#[derive(Error, Debug)]
pub enum MemoryBackendError {
    /// No such graph has ever been touched in this backend instance.
    #[error("graph '{graph_id}' not found")]
    GraphNotFound { graph_id: String },

    /// A transaction handle was committed or rolled back more than once.
    #[error("transaction already finished")]
    TransactionFinished,

    /// Serialization error while round-tripping a stored row.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryBackendError {
    pub fn graph_not_found(graph_id: impl Into<String>) -> Self {
        Self::GraphNotFound {
            graph_id: graph_id.into(),
        }
    }
}

impl From<MemoryBackendError> for typegraph_core::GraphError {
    fn from(err: MemoryBackendError) -> Self {
        typegraph_core::GraphError::database_from("in-memory backend error", err)
    }
}
