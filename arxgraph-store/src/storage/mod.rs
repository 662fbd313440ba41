//! Storage layer for arxgraph.
//!
//! A store is written to only through a [`StoreSession`], which wraps one
//! transaction. Nothing a session does is visible until [`StoreSession::commit`];
//! dropping a session without committing rolls it back.
//!
//! Provided stores:
//! - [`DuckStore`]: DuckDB file or in-memory database
//! - [`MemoryStore`]: staged in-process graph, for tests and dry runs

mod duck;
mod memory;
mod schema;

use anyhow::Result;
use arxgraph_core::{GraphNode, ImportRecord, Properties, Relationship};

pub use duck::{AccessMode, DuckSession, DuckStore, GraphStats};
pub use memory::{MemoryGraph, MemorySession, MemoryStore};
pub use schema::{IndexSpec, INDEXES, SCHEMA_SQL, SCHEMA_VERSION};

/// A graph database that can open write transactions.
pub trait GraphStore: Send + 'static {
    type Session<'a>: StoreSession
    where
        Self: 'a;

    /// Start a transaction.
    fn begin(&self) -> Result<Self::Session<'_>>;
}

/// Write primitives used by the plan executor, all within one transaction.
pub trait StoreSession {
    /// Remove every node, relationship and import record.
    fn clear_all(&mut self) -> Result<()>;

    /// Create any lookup index that is missing.
    fn ensure_indexes(&mut self) -> Result<()>;

    /// Merge nodes by key. New nodes get all properties; existing nodes get
    /// the new properties merged over the old. Returns the number written.
    fn upsert_nodes(&mut self, label: &str, nodes: &[GraphNode]) -> Result<usize>;

    /// Merge relationships by `(from, to, type)`, matching both endpoints by
    /// key. Relationships with a missing endpoint are skipped. Returns the
    /// number written.
    fn upsert_relationships(&mut self, rel_type: &str, relationships: &[Relationship]) -> Result<usize>;

    fn write_import_record(&mut self, record: &ImportRecord) -> Result<()>;

    /// Make every change of this session visible.
    fn commit(self) -> Result<()>;
}

/// Merge `update` over `base`, key by key.
pub(crate) fn merge_properties(base: &mut Properties, update: &Properties) {
    for (key, value) in update {
        base.insert(key.clone(), value.clone());
    }
}
