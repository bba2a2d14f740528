//! Schema serializer and lifecycle (component D + E).

pub mod diff;
pub mod document;
pub mod hash;
pub mod manager;

pub use diff::{diff_schema, ChangeKind, EdgeChange, NodeChange, SchemaDiff, Severity};
pub use document::{EdgeDoc, NodeDoc, SchemaDocument, serialize_schema};
pub use hash::content_hash;
pub use manager::{EnsureOutcome, EnsureSchemaOptions, MigrationHook, SchemaManager};
