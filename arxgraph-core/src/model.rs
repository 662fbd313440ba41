//! Property-graph model produced by extraction.
//!
//! Real nodes are keyed by the document identifier; virtual nodes are keyed by
//! their semantic path. The two live in separate [`NodeKey`] variants so a
//! path can never be mistaken for an identifier by accident.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node properties, ordered for stable output.
pub type Properties = BTreeMap<String, Value>;

/// Label carried by every synthesized placeholder node.
pub const VIRTUAL_LABEL: &str = "VirtualNode";

/// Identity of a node in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum NodeKey {
    /// Document identifier of a materialized element.
    Real(String),
    /// Semantic path of a synthesized placeholder.
    Virtual(String),
}

impl NodeKey {
    pub fn real(id: impl Into<String>) -> Self {
        NodeKey::Real(id.into())
    }

    pub fn virtual_path(path: impl Into<String>) -> Self {
        NodeKey::Virtual(path.into())
    }

    /// The raw key, without the key-space tag.
    pub fn as_str(&self) -> &str {
        match self {
            NodeKey::Real(id) => id,
            NodeKey::Virtual(path) => path,
        }
    }

    /// Name of the key space, as stored.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeKey::Real(_) => "real",
            NodeKey::Virtual(_) => "virtual",
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, NodeKey::Virtual(_))
    }

    /// Rebuild a key from its stored kind and raw key.
    pub fn from_parts(kind: &str, key: impl Into<String>) -> Option<Self> {
        match kind {
            "real" => Some(NodeKey::Real(key.into())),
            "virtual" => Some(NodeKey::Virtual(key.into())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Real(id) => write!(f, "{}", id),
            NodeKey::Virtual(path) => write!(f, "virtual:{}", path),
        }
    }
}

/// A node in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub key: NodeKey,
    pub label: String,
    pub properties: Properties,
}

impl GraphNode {
    /// Create a node for a materialized document element.
    pub fn real(id: impl Into<String>, label: impl Into<String>, properties: Properties) -> Self {
        Self {
            key: NodeKey::Real(id.into()),
            label: label.into(),
            properties,
        }
    }

    /// Create a placeholder for one segment of an unresolved target path.
    pub fn virtual_segment(path: &str, name: &str) -> Self {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), Value::from(name));
        properties.insert("short_name".to_string(), Value::from(name));
        properties.insert("path".to_string(), Value::from(path));
        properties.insert("virtual".to_string(), Value::Bool(true));

        Self {
            key: NodeKey::Virtual(path.to_string()),
            label: VIRTUAL_LABEL.to_string(),
            properties,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }

    pub fn path(&self) -> Option<&str> {
        self.properties.get("path").and_then(Value::as_str)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn is_virtual(&self) -> bool {
        self.key.is_virtual()
    }
}

/// A directed, typed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub rel_type: String,
    pub from: NodeKey,
    pub to: NodeKey,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl Relationship {
    pub fn new(from: NodeKey, to: NodeKey, rel_type: impl Into<String>) -> Self {
        Self {
            rel_type: rel_type.into(),
            from,
            to,
            properties: Properties::new(),
        }
    }

    /// Attach the declared destination type of a reference, if any.
    pub fn with_dest(mut self, dest: Option<&str>) -> Self {
        if let Some(dest) = dest {
            self.properties
                .insert("dest".to_string(), Value::from(dest));
        }
        self
    }

    /// Whether either endpoint is a synthesized placeholder.
    pub fn touches_virtual(&self) -> bool {
        self.from.is_virtual() || self.to.is_virtual()
    }

    fn identity(&self) -> (NodeKey, NodeKey, String) {
        (self.from.clone(), self.to.clone(), self.rel_type.clone())
    }
}

/// Insertion-ordered relationships, deduplicated by `(from, to, type)`.
///
/// The first relationship inserted for an identity wins; later duplicates are
/// dropped along with their properties.
#[derive(Debug, Clone, Default)]
pub struct RelationshipSet {
    items: Vec<Relationship>,
    seen: HashSet<(NodeKey, NodeKey, String)>,
}

impl RelationshipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a relationship. Returns `false` if an identical one exists.
    pub fn insert(&mut self, relationship: Relationship) -> bool {
        if self.seen.insert(relationship.identity()) {
            self.items.push(relationship);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, from: &NodeKey, to: &NodeKey, rel_type: &str) -> bool {
        self.seen
            .contains(&(from.clone(), to.clone(), rel_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Relationship> {
        self.items
    }
}

impl Extend<Relationship> for RelationshipSet {
    fn extend<I: IntoIterator<Item = Relationship>>(&mut self, iter: I) {
        for relationship in iter {
            self.insert(relationship);
        }
    }
}

impl IntoIterator for RelationshipSet {
    type Item = Relationship;
    type IntoIter = std::vec::IntoIter<Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A cross-reference waiting for the global path index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    /// Identifier of the nearest materialized node at or above the reference.
    pub from: String,
    pub target_path: String,
    /// Original reference tag, used as the relationship type.
    pub rel_type: String,
    /// Declared destination type, if the reference carried one.
    pub dest: Option<String>,
}

/// Why a reference could not be resolved to a real node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No materialized node has the target path.
    PathNotFound,
    /// The target path has no segments at all.
    EmptyPath,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::PathNotFound => "target path not found",
            UnresolvedReason::EmptyPath => "target path is empty",
        }
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference whose target was not found among the real nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub source_id: String,
    pub target_path: String,
    pub rel_type: String,
    pub dest: Option<String>,
    pub reason: UnresolvedReason,
}

/// Counts reported for one extraction or import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionCounts {
    pub nodes: usize,
    pub virtual_nodes: usize,
    pub relationships: usize,
    pub unresolved: usize,
}

/// The complete in-memory result of one extraction run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub nodes: Vec<GraphNode>,
    pub virtual_nodes: Vec<GraphNode>,
    pub relationships: Vec<Relationship>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Extraction {
    pub fn counts(&self) -> ExtractionCounts {
        ExtractionCounts {
            nodes: self.nodes.len(),
            virtual_nodes: self.virtual_nodes.len(),
            relationships: self.relationships.len(),
            unresolved: self.unresolved.len(),
        }
    }

    /// Real node with the given document identifier.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.key.as_str() == id)
    }

    /// Real node at the given semantic path.
    pub fn node_at(&self, path: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.path() == Some(path))
    }

    /// Virtual node keyed by the given path.
    pub fn virtual_node(&self, path: &str) -> Option<&GraphNode> {
        self.virtual_nodes.iter().find(|n| n.key.as_str() == path)
    }

    pub fn has_relationship(&self, from: &NodeKey, to: &NodeKey, rel_type: &str) -> bool {
        self.relationships
            .iter()
            .any(|r| &r.from == from && &r.to == to && r.rel_type == rel_type)
    }

    /// Relationships of one type, in output order.
    pub fn relationships_of<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.relationships
            .iter()
            .filter(move |r| r.rel_type == rel_type)
    }
}

/// Metadata describing one import batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: String,
    pub sources: Vec<String>,
    pub imported_at: DateTime<Utc>,
    pub node_count: usize,
    pub relationship_count: usize,
    pub virtual_node_count: usize,
    pub unresolved_count: usize,
}

impl ImportRecord {
    /// Create a record for a batch built from the given sources.
    pub fn new(sources: Vec<String>, counts: &ExtractionCounts) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sources,
            imported_at: Utc::now(),
            node_count: counts.nodes,
            relationship_count: counts.relationships,
            virtual_node_count: counts.virtual_nodes,
            unresolved_count: counts.unresolved,
        }
    }
}
