//! Ordered write plan handed to a graph store.
//!
//! The store never sees raw mutation calls. It receives the steps below, in
//! order, and must run all of them inside one transaction:
//!
//! 1. clear all prior state
//! 2. ensure indexes
//! 3. upsert real nodes, one batch per label
//! 4. upsert real-to-real relationships, one batch per type
//! 5. upsert virtual nodes, then the relationships touching them
//! 6. write the import record

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Extraction, GraphNode, ImportRecord, Relationship};

/// One step of a [`WritePlan`].
#[derive(Debug, Clone)]
pub enum WriteStep {
    ClearAll,
    EnsureIndexes,
    UpsertNodes { label: String, nodes: Vec<GraphNode> },
    UpsertRelationships { rel_type: String, relationships: Vec<Relationship> },
    UpsertVirtualNodes { nodes: Vec<GraphNode> },
    WriteImportRecord(ImportRecord),
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStep::ClearAll => write!(f, "clear all"),
            WriteStep::EnsureIndexes => write!(f, "ensure indexes"),
            WriteStep::UpsertNodes { label, nodes } => {
                write!(f, "upsert {} {} node(s)", nodes.len(), label)
            }
            WriteStep::UpsertRelationships {
                rel_type,
                relationships,
            } => write!(f, "upsert {} {} relationship(s)", relationships.len(), rel_type),
            WriteStep::UpsertVirtualNodes { nodes } => {
                write!(f, "upsert {} virtual node(s)", nodes.len())
            }
            WriteStep::WriteImportRecord(record) => write!(f, "write import record {}", record.id),
        }
    }
}

/// Full-replace write plan for one import batch.
#[derive(Debug, Clone)]
pub struct WritePlan {
    steps: Vec<WriteStep>,
}

impl WritePlan {
    /// Group an extraction into ordered batches.
    pub fn build(extraction: Extraction, record: ImportRecord) -> Self {
        let Extraction {
            nodes,
            virtual_nodes,
            relationships,
            ..
        } = extraction;

        let mut steps = vec![WriteStep::ClearAll, WriteStep::EnsureIndexes];

        let mut by_label: BTreeMap<String, Vec<GraphNode>> = BTreeMap::new();
        for node in nodes {
            by_label.entry(node.label.clone()).or_default().push(node);
        }
        steps.extend(
            by_label
                .into_iter()
                .map(|(label, nodes)| WriteStep::UpsertNodes { label, nodes }),
        );

        let (virtual_edges, real_edges): (Vec<_>, Vec<_>) = relationships
            .into_iter()
            .partition(Relationship::touches_virtual);

        steps.extend(group_relationships(real_edges));

        if !virtual_nodes.is_empty() {
            steps.push(WriteStep::UpsertVirtualNodes {
                nodes: virtual_nodes,
            });
        }
        steps.extend(group_relationships(virtual_edges));

        steps.push(WriteStep::WriteImportRecord(record));

        Self { steps }
    }

    pub fn steps(&self) -> &[WriteStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn group_relationships(relationships: Vec<Relationship>) -> impl Iterator<Item = WriteStep> {
    let mut by_type: BTreeMap<String, Vec<Relationship>> = BTreeMap::new();
    for relationship in relationships {
        by_type
            .entry(relationship.rel_type.clone())
            .or_default()
            .push(relationship);
    }
    by_type
        .into_iter()
        .map(|(rel_type, relationships)| WriteStep::UpsertRelationships {
            rel_type,
            relationships,
        })
}
