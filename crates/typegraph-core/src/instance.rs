//! Node/edge instance views returned to callers, and the temporal
//! visibility rules (`spec.md` §2 "Data model", §4.F) applied over them.
//!
//! These are distinct from [`crate::backend::NodeRow`]/[`EdgeRow`]: the
//! backend rows are the storage-facing shape; instances are what the
//! pipeline hands back, with metadata normalized to plain fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{EdgeRow, NodeRow};
use crate::types::TemporalMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInstance {
    pub kind: String,
    pub id: String,
    pub version: u64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub props: serde_json::Value,
}

impl From<NodeRow> for NodeInstance {
    fn from(row: NodeRow) -> Self {
        Self {
            kind: row.kind,
            id: row.id,
            version: row.meta.version,
            valid_from: row.meta.valid_from,
            valid_to: row.meta.valid_to,
            created_at: row.meta.created_at,
            updated_at: row.meta.updated_at,
            deleted_at: row.meta.deleted_at,
            props: row.props,
        }
    }
}

impl NodeInstance {
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
#[serde(rename_all = "camelCase")]
pub struct EdgeInstance {
    pub id: String,
    pub kind: String,
    pub from_kind: String,
    pub from_id: String,
    pub to_kind: String,
    pub to_id: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub props: serde_json::Value,
}

impl From<EdgeRow> for EdgeInstance {
    fn from(row: EdgeRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            from_kind: row.from_kind,
            from_id: row.from_id,
            to_kind: row.to_kind,
            to_id: row.to_id,
            valid_from: row.meta.valid_from,
            valid_to: row.meta.valid_to,
            created_at: row.meta.created_at,
            updated_at: row.meta.updated_at,
            deleted_at: row.meta.deleted_at,
            props: row.props,
        }
    }
}

impl EdgeInstance {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        let after_start = self.valid_from.map(|f| f <= at).unwrap_or(true);
        let before_end = self.valid_to.map(|t| at < t).unwrap_or(true);
        after_start && before_end
    }
}

/// A temporal viewpoint: which mode, and (for `AsOf`) which instant.
#[derive(Debug, Clone, Copy)]
pub struct TemporalQuery {
    pub mode: TemporalMode,
    pub as_of: Option<DateTime<Utc>>,
}

impl TemporalQuery {
    pub fn current() -> Self {
        Self {
            mode: TemporalMode::Current,
            as_of: None,
        }
    }

    pub fn as_of(at: DateTime<Utc>) -> Self {
        Self {
            mode: TemporalMode::AsOf,
            as_of: Some(at),
        }
    }

    pub fn include_ended() -> Self {
        Self {
            mode: TemporalMode::IncludeEnded,
            as_of: None,
        }
    }

    pub fn include_tombstones() -> Self {
        Self {
            mode: TemporalMode::IncludeTombstones,
            as_of: None,
        }
    }

    /// Whether an instance with the given liveness/validity should be
    /// visible under this viewpoint, evaluated at `now`.
    pub fn visible(&self, is_live: bool, valid_at_now: bool, valid_at_as_of: bool) -> bool {
        match self.mode {
            TemporalMode::Current => is_live && valid_at_now,
            TemporalMode::AsOf => is_live && valid_at_as_of,
            TemporalMode::IncludeEnded => is_live,
            TemporalMode::IncludeTombstones => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_mode_requires_live_and_valid_now() {
        let q = TemporalQuery::current();
        assert!(q.visible(true, true, true));
        assert!(!q.visible(false, true, true));
        assert!(!q.visible(true, false, true));
    }

    #[test]
    fn include_tombstones_shows_everything() {
        let q = TemporalQuery::include_tombstones();
        assert!(q.visible(false, false, false));
    }

    #[test]
    fn as_of_mode_ignores_current_validity() {
        let q = TemporalQuery::as_of(Utc::now());
        assert!(q.visible(true, false, true));
        assert!(!q.visible(true, true, false));
    }
}
