//! Reference resolver and virtual node synthesizer.
//!
//! Runs after every document has been merged and walked, because resolution
//! needs the global `path -> id` index. References that hit the index become
//! typed edges. The rest are reported as unresolved and materialized as
//! chains of virtual nodes, one per path segment, shared by prefix across the
//! whole batch.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::{ExtractConfig, VirtualPolicy};
use crate::model::{
    GraphNode, NodeKey, PendingReference, Relationship, RelationshipSet, UnresolvedReason,
    UnresolvedReference,
};

/// Output of the resolution pass.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Resolved reference edges plus every edge of the virtual chains.
    pub relationships: RelationshipSet,
    pub virtual_nodes: Vec<GraphNode>,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Semantic path to document identifier, over real nodes only.
#[derive(Debug, Default)]
pub struct PathIndex {
    by_path: HashMap<String, String>,
}

impl PathIndex {
    /// Index every node that carries a path. The first node registered for a
    /// path keeps it.
    pub fn build(nodes: &[GraphNode]) -> Self {
        let mut by_path = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let Some(path) = node.path() else { continue };
            let id = node.key.as_str();
            if let Some(existing) = by_path.get(path) {
                warn!(path, kept = %existing, ignored = id, "Two nodes share a semantic path");
                continue;
            }
            by_path.insert(path.to_string(), id.to_string());
        }
        Self { by_path }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Non-empty segments of a reference target path.
pub fn path_segments(target: &str) -> Vec<&str> {
    target
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Canonical form of a target path: `/`-rooted, no empty segments.
pub fn normalize_target(target: &str) -> Option<String> {
    let segments = path_segments(target);
    if segments.is_empty() {
        None
    } else {
        Some(format!("/{}", segments.join("/")))
    }
}

/// Turn pending references into edges, synthesizing placeholders for targets
/// that are not in `nodes`.
pub fn resolve(
    nodes: &[GraphNode],
    pending: &[PendingReference],
    config: &ExtractConfig,
) -> Resolution {
    let index = PathIndex::build(nodes);
    let mut relationships = RelationshipSet::new();
    let mut unresolved = Vec::new();

    for reference in pending {
        let target = normalize_target(&reference.target_path);
        match target.as_deref().map(|path| (path, index.get(path))) {
            Some((_, Some(id))) => {
                relationships.insert(
                    Relationship::new(
                        NodeKey::real(reference.from.as_str()),
                        NodeKey::real(id),
                        reference.rel_type.as_str(),
                    )
                    .with_dest(reference.dest.as_deref()),
                );
            }
            Some((path, None)) => {
                debug!(from = %reference.from, target = path, "Unresolved reference");
                unresolved.push(unresolved_entry(reference, UnresolvedReason::PathNotFound));
            }
            None => {
                warn!(from = %reference.from, target = %reference.target_path, "Reference target has no path segments");
                unresolved.push(unresolved_entry(reference, UnresolvedReason::EmptyPath));
            }
        }
    }

    let resolved = relationships.len();
    let mut synthesizer = VirtualSynthesizer::new(&index, config);
    for entry in &unresolved {
        synthesizer.materialize(entry, &mut relationships);
    }
    let virtual_nodes = synthesizer.into_nodes();

    info!(
        resolved,
        unresolved = unresolved.len(),
        virtual_nodes = virtual_nodes.len(),
        policy = config.virtual_policy.as_str(),
        "Resolved references"
    );

    Resolution {
        relationships,
        virtual_nodes,
        unresolved,
    }
}

fn unresolved_entry(reference: &PendingReference, reason: UnresolvedReason) -> UnresolvedReference {
    UnresolvedReference {
        source_id: reference.from.clone(),
        target_path: reference.target_path.clone(),
        rel_type: reference.rel_type.clone(),
        dest: reference.dest.clone(),
        reason,
    }
}

/// Builds placeholder chains. The prefix map spans every unresolved entry of
/// the batch, so shared ancestors are created once.
struct VirtualSynthesizer<'a> {
    index: &'a PathIndex,
    policy: VirtualPolicy,
    containment_type: &'a str,
    by_path: HashMap<String, usize>,
    nodes: Vec<GraphNode>,
}

impl<'a> VirtualSynthesizer<'a> {
    fn new(index: &'a PathIndex, config: &'a ExtractConfig) -> Self {
        Self {
            index,
            policy: config.virtual_policy,
            containment_type: &config.containment_type,
            by_path: HashMap::new(),
            nodes: Vec::new(),
        }
    }

    fn materialize(&mut self, entry: &UnresolvedReference, relationships: &mut RelationshipSet) {
        let segments = path_segments(&entry.target_path);
        if segments.is_empty() {
            return;
        }

        let index = self.index;
        let mut prefix = String::new();
        let mut parent: Option<NodeKey> = None;

        for segment in segments {
            prefix.push('/');
            prefix.push_str(segment);

            let key = match (self.policy, index.get(&prefix)) {
                (VirtualPolicy::ReuseReal, Some(id)) => NodeKey::real(id),
                _ => self.virtual_key(&prefix, segment),
            };

            if let Some(parent) = parent.take() {
                // A real node's single containment parent comes from the
                // documents, never from a chain.
                if key.is_virtual() {
                    relationships.insert(Relationship::new(
                        parent,
                        key.clone(),
                        self.containment_type,
                    ));
                }
            }
            parent = Some(key);
        }

        if let Some(target) = parent {
            relationships.insert(
                Relationship::new(
                    NodeKey::real(entry.source_id.as_str()),
                    target,
                    entry.rel_type.as_str(),
                )
                .with_dest(entry.dest.as_deref()),
            );
        }
    }

    fn virtual_key(&mut self, path: &str, name: &str) -> NodeKey {
        if !self.by_path.contains_key(path) {
            self.by_path.insert(path.to_string(), self.nodes.len());
            self.nodes.push(GraphNode::virtual_segment(path, name));
        }
        NodeKey::virtual_path(path)
    }

    fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }
}
