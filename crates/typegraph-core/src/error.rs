//! The error taxonomy exposed by the engine.
//!
//! Every fallible operation returns a [`GraphError`] carrying a stable
//! `kind()`, a structured context payload, and an optional `suggestion`
//! string. Backend errors are wrapped in [`GraphError::Database`] unless the
//! backend already raised a typed domain error it recognized itself (for
//! example a unique-index collision).

use std::collections::BTreeMap;
use thiserror::Error;

/// Stable, machine-matchable error kind. Mirrors `spec.md` §7 exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    KindNotFound,
    Validation,
    NodeNotFound,
    EdgeNotFound,
    EndpointNotFound,
    Uniqueness,
    Cardinality,
    RestrictedDelete,
    Database,
    Migration,
    UnsupportedPredicate,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::KindNotFound => "kind-not-found",
            ErrorKind::Validation => "validation",
            ErrorKind::NodeNotFound => "node-not-found",
            ErrorKind::EdgeNotFound => "edge-not-found",
            ErrorKind::EndpointNotFound => "endpoint-not-found",
            ErrorKind::Uniqueness => "uniqueness",
            ErrorKind::Cardinality => "cardinality",
            ErrorKind::RestrictedDelete => "restricted-delete",
            ErrorKind::Database => "database",
            ErrorKind::Migration => "migration",
            ErrorKind::UnsupportedPredicate => "unsupported-predicate",
        }
    }
}

/// One structured validation failure, with a JSON-pointer-ish `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Structured context carried alongside every error: kind, id, constraint
/// name, fields, etc. Kept as an ordered map so messages are reproducible.
pub type ErrorContext = BTreeMap<String, String>;

/// The single error type returned by every fallible public operation.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("configuration error ({key}): {message}")]
    Configuration { key: String, message: String },

    #[error("kind '{kind}' not found in graph definition")]
    KindNotFound { kind: String },

    #[error("validation failed: {issues:?}")]
    Validation {
        issues: Vec<ValidationIssue>,
        suggestion: Option<String>,
    },

    #[error("node '{kind}:{id}' not found")]
    NodeNotFound { kind: String, id: String },

    #[error("edge '{kind}:{id}' not found")]
    EdgeNotFound { kind: String, id: String },

    #[error("endpoint not found: {edge_kind} {endpoint} ({node_kind}:{node_id})")]
    EndpointNotFound {
        edge_kind: String,
        endpoint: &'static str,
        node_kind: String,
        node_id: String,
    },

    #[error("uniqueness violation on constraint '{constraint}' of kind '{kind}': existing node '{existing_id}'")]
    Uniqueness {
        kind: String,
        constraint: String,
        existing_id: String,
    },

    #[error("cardinality violation for edge kind '{edge_kind}' ({mode}) from '{from_kind}:{from_id}'")]
    Cardinality {
        edge_kind: String,
        mode: String,
        from_kind: String,
        from_id: String,
    },

    #[error("cannot delete '{kind}:{id}': {edge_count} live edge(s) of kind(s) {edge_kinds:?} still attached")]
    RestrictedDelete {
        kind: String,
        id: String,
        edge_kinds: Vec<String>,
        edge_count: usize,
    },

    #[error("database operation failed: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("schema migration error: {message}")]
    Migration { message: String, plan: Vec<String> },

    #[error("where-predicate unsupported: {message}")]
    UnsupportedPredicate { message: String },
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Configuration { .. } => ErrorKind::Configuration,
            GraphError::KindNotFound { .. } => ErrorKind::KindNotFound,
            GraphError::Validation { .. } => ErrorKind::Validation,
            GraphError::NodeNotFound { .. } => ErrorKind::NodeNotFound,
            GraphError::EdgeNotFound { .. } => ErrorKind::EdgeNotFound,
            GraphError::EndpointNotFound { .. } => ErrorKind::EndpointNotFound,
            GraphError::Uniqueness { .. } => ErrorKind::Uniqueness,
            GraphError::Cardinality { .. } => ErrorKind::Cardinality,
            GraphError::RestrictedDelete { .. } => ErrorKind::RestrictedDelete,
            GraphError::Database { .. } => ErrorKind::Database,
            GraphError::Migration { .. } => ErrorKind::Migration,
            GraphError::UnsupportedPredicate { .. } => ErrorKind::UnsupportedPredicate,
        }
    }

    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn kind_not_found(kind: impl Into<String>) -> Self {
        Self::KindNotFound { kind: kind.into() }
    }

    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        Self::Validation {
            issues,
            suggestion: None,
        }
    }

    pub fn validation_msg(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::validation(vec![ValidationIssue::new(path, message)])
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        if let Self::Validation { suggestion: s, .. } = &mut self {
            *s = Some(suggestion.into());
        }
        self
    }

    pub fn node_not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn edge_not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EdgeNotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn endpoint_not_found(
        edge_kind: impl Into<String>,
        endpoint: &'static str,
        node_kind: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self::EndpointNotFound {
            edge_kind: edge_kind.into(),
            endpoint,
            node_kind: node_kind.into(),
            node_id: node_id.into(),
        }
    }

    pub fn uniqueness(
        kind: impl Into<String>,
        constraint: impl Into<String>,
        existing_id: impl Into<String>,
    ) -> Self {
        Self::Uniqueness {
            kind: kind.into(),
            constraint: constraint.into(),
            existing_id: existing_id.into(),
        }
    }

    pub fn cardinality(
        edge_kind: impl Into<String>,
        mode: impl Into<String>,
        from_kind: impl Into<String>,
        from_id: impl Into<String>,
    ) -> Self {
        Self::Cardinality {
            edge_kind: edge_kind.into(),
            mode: mode.into(),
            from_kind: from_kind.into(),
            from_id: from_id.into(),
        }
    }

    pub fn restricted_delete(
        kind: impl Into<String>,
        id: impl Into<String>,
        edge_kinds: Vec<String>,
        edge_count: usize,
    ) -> Self {
        Self::RestrictedDelete {
            kind: kind.into(),
            id: id.into(),
            edge_kinds,
            edge_count,
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    pub fn database_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn migration(message: impl Into<String>, plan: Vec<String>) -> Self {
        Self::Migration {
            message: message.into(),
            plan,
        }
    }

    pub fn unsupported_predicate(message: impl Into<String>) -> Self {
        Self::UnsupportedPredicate {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = GraphError::node_not_found("Person", "alice");
        assert_eq!(err.kind(), ErrorKind::NodeNotFound);
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn validation_carries_issues_and_suggestion() {
        let err = GraphError::validation_msg("email", "must be present")
            .with_suggestion("supply an email field");
        match &err {
            GraphError::Validation { issues, suggestion } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(suggestion.as_deref(), Some("supply an email field"));
            }
            _ => panic!("wrong variant"),
        }
    }
}
