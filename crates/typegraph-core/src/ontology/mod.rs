//! Ontology reasoner: components B (closure builder) and C (kind registry).

pub mod closures;
pub mod registry;

pub use closures::{build_closures, normalize_pair, Closures};
pub use registry::KindRegistry;
