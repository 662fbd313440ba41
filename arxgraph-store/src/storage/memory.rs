//! In-process graph store.
//!
//! A session works on a copy of the graph and swaps it in on commit, so the
//! transaction semantics match [`super::DuckStore`] without a database.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use arxgraph_core::{GraphNode, ImportRecord, NodeKey, Relationship};

use super::{merge_properties, GraphStore, StoreSession};

/// Committed contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    pub nodes: BTreeMap<NodeKey, GraphNode>,
    /// Keyed by `(from, to, type)`.
    pub relationships: BTreeMap<(NodeKey, NodeKey, String), Relationship>,
    pub import_records: Vec<ImportRecord>,
}

impl MemoryGraph {
    pub fn node(&self, key: &NodeKey) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    pub fn has_relationship(&self, from: &NodeKey, to: &NodeKey, rel_type: &str) -> bool {
        self.relationships
            .contains_key(&(from.clone(), to.clone(), rel_type.to_string()))
    }

    pub fn virtual_node_count(&self) -> usize {
        self.nodes.keys().filter(|k| k.is_virtual()).count()
    }
}

/// Mutex-guarded in-memory graph with staged transactions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: Mutex<MemoryGraph>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed graph.
    pub fn snapshot(&self) -> MemoryGraph {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryGraph> {
        match self.graph.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Recovering from poisoned graph mutex");
                poisoned.into_inner()
            }
        }
    }
}

impl GraphStore for MemoryStore {
    type Session<'a> = MemorySession<'a>;

    fn begin(&self) -> Result<MemorySession<'_>> {
        let committed = self.lock();
        let staged = committed.clone();
        Ok(MemorySession { committed, staged })
    }
}

/// Staged changes over a locked [`MemoryGraph`]. Dropping discards them.
pub struct MemorySession<'a> {
    committed: MutexGuard<'a, MemoryGraph>,
    staged: MemoryGraph,
}

impl StoreSession for MemorySession<'_> {
    fn clear_all(&mut self) -> Result<()> {
        self.staged = MemoryGraph::default();
        Ok(())
    }

    fn ensure_indexes(&mut self) -> Result<()> {
        Ok(())
    }

    fn upsert_nodes(&mut self, label: &str, nodes: &[GraphNode]) -> Result<usize> {
        for node in nodes {
            match self.staged.nodes.get_mut(&node.key) {
                Some(existing) => {
                    existing.label = node.label.clone();
                    merge_properties(&mut existing.properties, &node.properties);
                }
                None => {
                    self.staged.nodes.insert(node.key.clone(), node.clone());
                }
            }
        }
        debug!(label, count = nodes.len(), "Upserted nodes");
        Ok(nodes.len())
    }

    fn upsert_relationships(&mut self, rel_type: &str, relationships: &[Relationship]) -> Result<usize> {
        let mut written = 0;
        for relationship in relationships {
            if !self.staged.nodes.contains_key(&relationship.from)
                || !self.staged.nodes.contains_key(&relationship.to)
            {
                debug!(
                    from = %relationship.from,
                    to = %relationship.to,
                    "Relationship endpoint missing, skipping"
                );
                continue;
            }
            let identity = (
                relationship.from.clone(),
                relationship.to.clone(),
                relationship.rel_type.clone(),
            );
            match self.staged.relationships.get_mut(&identity) {
                Some(existing) => merge_properties(&mut existing.properties, &relationship.properties),
                None => {
                    self.staged.relationships.insert(identity, relationship.clone());
                }
            }
            written += 1;
        }
        debug!(rel_type, written, "Upserted relationships");
        Ok(written)
    }

    fn write_import_record(&mut self, record: &ImportRecord) -> Result<()> {
        self.staged.import_records.push(record.clone());
        Ok(())
    }

    fn commit(self) -> Result<()> {
        let MemorySession {
            mut committed,
            staged,
        } = self;
        *committed = staged;
        Ok(())
    }
}
