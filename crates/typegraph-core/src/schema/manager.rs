//! Schema lifecycle (component E): the `ensureSchema`/`rollbackSchema` state
//! machine described in `spec.md` §4.E.
//!
//! ```text
//!           no active schema row
//!                 │ ensureSchema
//!                 ▼
//!   insert version 1 as active ──────────────► Initialized
//!
//!   active exists
//!     hash matches ───────────────────────────► Unchanged
//!     hash differs, diff empty ───────────────► Unchanged
//!     diff safe/warning, autoMigrate ─────────► Migrated
//!     diff safe/warning, !autoMigrate ────────► Pending
//!     diff breaking, throwOnBreaking ─────────► Migration error (with plan)
//!     diff breaking, !throwOnBreaking ────────► Breaking
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::backend::{Backend, SchemaVersionRow};
use crate::error::{GraphError, Result};
use crate::ontology::Closures;
use crate::types::GraphDefinition;

use super::diff::{diff_schema, SchemaDiff};
use super::document::{serialize_schema, SchemaDocument};
use super::hash::content_hash;

/// An advisory hook invoked around a migration. Per `spec.md` §9 ("Hook
/// non-interference"), hooks observe; they must never perform data
/// transformations, and their failures never abort a migration already in
/// flight.
pub type MigrationHook = Arc<dyn Fn(&SchemaDiff) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EnsureSchemaOptions {
    pub auto_migrate: bool,
    pub throw_on_breaking: bool,
    pub before_migrate: Option<MigrationHook>,
    pub after_migrate: Option<MigrationHook>,
}

#[derive(Debug, Clone)]
pub enum EnsureOutcome {
    Initialized { version: u64 },
    Unchanged { version: u64 },
    Migrated { from: u64, to: u64, diff: SchemaDiff },
    Pending { diff: SchemaDiff },
    Breaking { diff: SchemaDiff },
}

pub struct SchemaManager {
    backend: Arc<dyn Backend>,
}

impl SchemaManager {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn ensure_schema(
        &self,
        def: &GraphDefinition,
        closures: &Closures,
        now: DateTime<Utc>,
        opts: &EnsureSchemaOptions,
    ) -> Result<EnsureOutcome> {
        let active = self.backend.get_active_schema(&def.graph_id).await?;

        let Some(active) = active else {
            let doc = serialize_schema(def, closures, 1, now.to_rfc3339());
            let hash = content_hash(&doc);
            self.backend
                .insert_schema(SchemaVersionRow {
                    graph_id: def.graph_id.clone(),
                    version: 1,
                    hash,
                    document: serde_json::to_value(&doc)
                        .map_err(|e| GraphError::database_from("serialize schema document", e))?,
                    is_active: true,
                })
                .await?;
            info!(graph_id = %def.graph_id, "schema initialized at version 1");
            return Ok(EnsureOutcome::Initialized { version: 1 });
        };

        let candidate = serialize_schema(def, closures, active.version + 1, now.to_rfc3339());
        let candidate_hash = content_hash(&candidate);

        if candidate_hash == active.hash {
            return Ok(EnsureOutcome::Unchanged {
                version: active.version,
            });
        }

        let before: SchemaDocument = serde_json::from_value(active.document.clone())
            .map_err(|e| GraphError::database_from("deserialize stored schema document", e))?;
        let diff = diff_schema(&before, &candidate);

        if !diff.has_changes {
            return Ok(EnsureOutcome::Unchanged {
                version: active.version,
            });
        }

        if diff.has_breaking_changes {
            if opts.throw_on_breaking {
                return Err(GraphError::migration(
                    format!("breaking schema change for graph '{}': {}", def.graph_id, diff.summary),
                    diff.migration_plan.clone(),
                ));
            }
            warn!(graph_id = %def.graph_id, summary = %diff.summary, "schema has breaking changes, not migrating");
            return Ok(EnsureOutcome::Breaking { diff });
        }

        if !opts.auto_migrate {
            return Ok(EnsureOutcome::Pending { diff });
        }

        if let Some(hook) = &opts.before_migrate {
            hook(&diff);
        }

        let new_version = active.version + 1;
        self.backend
            .insert_schema(SchemaVersionRow {
                graph_id: def.graph_id.clone(),
                version: new_version,
                hash: candidate_hash,
                document: serde_json::to_value(&candidate)
                    .map_err(|e| GraphError::database_from("serialize schema document", e))?,
                is_active: false,
            })
            .await?;
        self.backend.set_active_schema(&def.graph_id, new_version).await?;

        if let Some(hook) = &opts.after_migrate {
            hook(&diff);
        }

        info!(graph_id = %def.graph_id, from = active.version, to = new_version, "schema migrated");
        Ok(EnsureOutcome::Migrated {
            from: active.version,
            to: new_version,
            diff,
        })
    }

    /// Flip the active pointer back to `target`. Never deletes a version row.
    pub async fn rollback_schema(&self, graph_id: &str, target: u64) -> Result<()> {
        let row = self.backend.get_schema_version(graph_id, target).await?;
        if row.is_none() {
            return Err(GraphError::migration(
                format!("schema version {target} not found for graph '{graph_id}'"),
                Vec::new(),
            ));
        }
        self.backend.set_active_schema(graph_id, target).await?;
        info!(graph_id = %graph_id, target, "schema rolled back");
        Ok(())
    }
}
