//! Operation-hook envelopes: every single-item pipeline write runs inside
//! one of these, giving callers a stable id plus structured context to
//! correlate logs/metrics/hooks across an operation's lifetime. Batch
//! operations bypass per-item envelopes for throughput; see `batch.rs`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    CreateNode,
    UpdateNode,
    DeleteNode,
    CreateEdge,
    UpdateEdge,
    DeleteEdge,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateNode => "create-node",
            OperationKind::UpdateNode => "update-node",
            OperationKind::DeleteNode => "delete-node",
            OperationKind::CreateEdge => "create-edge",
            OperationKind::UpdateEdge => "update-edge",
            OperationKind::DeleteEdge => "delete-edge",
        }
    }
}

/// The structured context threaded through `onOperationStart`/`onOperationEnd`/
/// `onError`: a fresh operation id, the graph and entity being written, and
/// the instant the operation began.
#[derive(Debug, Clone)]
pub struct OperationEnvelope {
    pub operation_id: Uuid,
    pub operation: OperationKind,
    pub graph_id: String,
    pub entity: &'static str,
    pub kind: String,
    pub id: String,
    pub started_at: DateTime<Utc>,
}

pub fn new_envelope(
    operation: OperationKind,
    entity: &'static str,
    kind: impl Into<String>,
    id: impl Into<String>,
    graph_id: impl Into<String>,
    now: DateTime<Utc>,
) -> OperationEnvelope {
    OperationEnvelope {
        operation_id: Uuid::new_v4(),
        operation,
        graph_id: graph_id.into(),
        entity,
        kind: kind.into(),
        id: id.into(),
        started_at: now,
    }
}

/// Advisory hooks fired around an operation. A hook observes; it never
/// vetoes, and its panics are not caught here. This is a hard contract: a
/// hook must not be promoted into a plugin point that could destabilize the
/// write pipeline's own outcome.
#[derive(Clone, Default)]
pub struct OperationHooks {
    pub on_start: Option<Arc<dyn Fn(&OperationEnvelope) + Send + Sync>>,
    pub on_end: Option<Arc<dyn Fn(&OperationEnvelope, i64) + Send + Sync>>,
    pub on_error: Option<Arc<dyn Fn(&OperationEnvelope, &GraphError) + Send + Sync>>,
}

impl OperationHooks {
    pub fn fire_start(&self, envelope: &OperationEnvelope) {
        if let Some(hook) = &self.on_start {
            hook(envelope);
        }
    }

    pub fn fire_end(&self, envelope: &OperationEnvelope, duration_ms: i64) {
        if let Some(hook) = &self.on_end {
            hook(envelope, duration_ms);
        }
    }

    pub fn fire_error(&self, envelope: &OperationEnvelope, err: &GraphError) {
        if let Some(hook) = &self.on_error {
            hook(envelope, err);
        }
    }
}

impl std::fmt::Debug for OperationHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_end", &self.on_end.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Run `op` inside an envelope: fires `onOperationStart` before, then either
/// `onOperationEnd({durationMs})` on success or `onError(ctx, err)` on
/// failure. The hook outcome never influences the result.
pub async fn run_with_envelope<T, Fut>(
    hooks: &OperationHooks,
    envelope: OperationEnvelope,
    now: impl Fn() -> DateTime<Utc>,
    op: Fut,
) -> crate::error::Result<T>
where
    Fut: std::future::Future<Output = crate::error::Result<T>>,
{
    hooks.fire_start(&envelope);
    match op.await {
        Ok(value) => {
            let duration_ms = (now() - envelope.started_at).num_milliseconds();
            hooks.fire_end(&envelope, duration_ms);
            Ok(value)
        }
        Err(err) => {
            hooks.fire_error(&envelope, &err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_a_fresh_id_per_call() {
        let now = Utc::now();
        let a = new_envelope(OperationKind::CreateNode, "node", "Person", "p1", "g", now);
        let b = new_envelope(OperationKind::CreateNode, "node", "Person", "p1", "g", now);
        assert_ne!(a.operation_id, b.operation_id);
    }

    #[tokio::test]
    async fn run_with_envelope_fires_end_on_success_and_error_on_failure() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let starts = Arc::new(AtomicUsize::new(0));
        let ends = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let hooks = {
            let starts = starts.clone();
            let ends = ends.clone();
            let errors = errors.clone();
            OperationHooks {
                on_start: Some(Arc::new(move |_| {
                    starts.fetch_add(1, Ordering::SeqCst);
                })),
                on_end: Some(Arc::new(move |_, _| {
                    ends.fetch_add(1, Ordering::SeqCst);
                })),
                on_error: Some(Arc::new(move |_, _| {
                    errors.fetch_add(1, Ordering::SeqCst);
                })),
            }
        };

        let now = Utc::now();
        let ok_envelope = new_envelope(OperationKind::CreateNode, "node", "Person", "p1", "g", now);
        let ok: crate::error::Result<()> = run_with_envelope(&hooks, ok_envelope, Utc::now, async { Ok(()) }).await;
        assert!(ok.is_ok());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);

        let err_envelope = new_envelope(OperationKind::CreateNode, "node", "Person", "p2", "g", now);
        let failed: crate::error::Result<()> = run_with_envelope(&hooks, err_envelope, Utc::now, async {
            Err(GraphError::kind_not_found("Person"))
        })
        .await;
        assert!(failed.is_err());
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}
