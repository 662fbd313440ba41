//! Semantic path builder, node extractor and reference collector.
//!
//! A single recursive walk over the element tree:
//!
//! - elements carrying both a name and an identifier become [`GraphNode`]s,
//!   linked to their nearest materialized ancestor by a containment edge;
//! - named elements without an identifier extend the semantic path but
//!   produce nothing themselves;
//! - single-target reference children are recorded as [`PendingReference`]s
//!   against the nearest materialized node and are not walked further.
//!
//! All accumulation goes through an explicit [`ExtractionContext`].

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ExtractConfig;
use crate::element::Element;
use crate::model::{GraphNode, NodeKey, PendingReference, Properties, Relationship, RelationshipSet};

/// Accumulated state for one extraction run.
#[derive(Debug, Default)]
pub struct ExtractionContext {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
    relationships: RelationshipSet,
    pending: Vec<PendingReference>,
}

impl ExtractionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn relationships(&self) -> &RelationshipSet {
        &self.relationships
    }

    pub fn pending(&self) -> &[PendingReference] {
        &self.pending
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&slot| &self.nodes[slot])
    }

    /// Split into `(nodes, relationships, pending references)`.
    pub fn into_parts(self) -> (Vec<GraphNode>, RelationshipSet, Vec<PendingReference>) {
        (self.nodes, self.relationships, self.pending)
    }

    fn insert_node(&mut self, id: &str, node: GraphNode) {
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(node);
    }
}

/// Extract nodes, containment edges and pending references from a tree.
pub fn extract(root: &Element, config: &ExtractConfig) -> ExtractionContext {
    let mut ctx = ExtractionContext::new();
    extract_into(&mut ctx, root, config);
    debug!(
        nodes = ctx.nodes.len(),
        relationships = ctx.relationships.len(),
        pending = ctx.pending.len(),
        "Extraction walk finished"
    );
    ctx
}

/// Walk `root` into an existing context. Identifiers already present in the
/// context are treated as duplicates.
pub fn extract_into(ctx: &mut ExtractionContext, root: &Element, config: &ExtractConfig) {
    let mut walker = Walker { ctx, config };
    let mut names = Vec::new();
    walker.visit(root, &mut names, None);
}

/// Normalize a tag or property key: uppercase, separators removed.
///
/// `SENDER-RECEIVER-INTERFACE` becomes `SENDERRECEIVERINTERFACE`.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | '_' | '.' | ':') && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Join ancestor names into a semantic path rooted at `/`.
pub fn semantic_path<S: AsRef<str>>(names: &[S]) -> String {
    let mut path = String::new();
    for name in names {
        path.push('/');
        path.push_str(name.as_ref());
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

struct Walker<'a> {
    ctx: &'a mut ExtractionContext,
    config: &'a ExtractConfig,
}

impl Walker<'_> {
    fn visit(&mut self, element: &Element, names: &mut Vec<String>, parent: Option<&str>) {
        let name = element.child_text(&self.config.name_key);
        let id = element
            .attribute(&self.config.id_attribute)
            .map(str::trim)
            .filter(|id| !id.is_empty());

        if let Some(name) = name {
            names.push(name.to_string());
        }

        let created = match (name, id) {
            (Some(name), Some(id)) => self.materialize(element, id, name, names, parent),
            _ => None,
        };
        let effective = created.as_deref().or(parent);

        for (key, group) in &element.children {
            if *key == self.config.name_key {
                continue;
            }
            if self.config.is_reference_key(key) {
                for reference in group {
                    self.collect_reference(key, reference, effective);
                }
                continue;
            }
            for child in group {
                self.visit(child, names, effective);
            }
        }

        if name.is_some() {
            names.pop();
        }
    }

    /// Create the node for `element` unless its identifier was seen before.
    /// Returns the identifier when a node was created.
    fn materialize(
        &mut self,
        element: &Element,
        id: &str,
        name: &str,
        names: &[String],
        parent: Option<&str>,
    ) -> Option<String> {
        let path = semantic_path(names);

        if self.ctx.contains(id) {
            debug!(id, path = %path, "Duplicate identifier, keeping first occurrence");
            return None;
        }

        let properties = self.properties(element, name, &path);
        self.ctx
            .insert_node(id, GraphNode::real(id, normalize_key(&element.tag), properties));

        if let Some(parent) = parent {
            self.ctx.relationships.insert(Relationship::new(
                NodeKey::real(parent),
                NodeKey::real(id),
                self.config.containment_type.as_str(),
            ));
        }

        Some(id.to_string())
    }

    fn properties(&self, element: &Element, name: &str, path: &str) -> Properties {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), Value::from(name));
        properties.insert("short_name".to_string(), Value::from(name));
        properties.insert("path".to_string(), Value::from(path));
        properties.insert("tag".to_string(), Value::from(element.tag.as_str()));

        for (key, value) in &element.attributes {
            if *key == self.config.id_attribute {
                continue;
            }
            insert_property(&mut properties, key, value);
        }

        for (key, group) in &element.children {
            if *key == self.config.name_key {
                continue;
            }
            if let [only] = group.as_slice() {
                if let (true, Some(text)) = (only.is_pure_text(), only.text()) {
                    insert_property(&mut properties, key, text);
                }
            }
        }

        properties
    }

    fn collect_reference(&mut self, key: &str, reference: &Element, from: Option<&str>) {
        let Some(target) = reference.text().filter(|t| !t.is_empty()) else {
            warn!(tag = key, "Reference without a target path, skipping");
            return;
        };
        let Some(from) = from else {
            debug!(tag = key, target, "Reference outside any materialized element, dropping");
            return;
        };

        self.ctx.pending.push(PendingReference {
            from: from.to_string(),
            target_path: target.to_string(),
            rel_type: key.to_string(),
            dest: reference
                .attribute(&self.config.dest_attribute)
                .map(str::to_string),
        });
    }
}

fn insert_property(properties: &mut Properties, raw_key: &str, value: &str) {
    let key = normalize_key(raw_key);
    if properties.contains_key(&key) {
        warn!(key = %key, raw_key, "Property key collision after normalization, keeping first value");
        return;
    }
    properties.insert(key, Value::from(value));
}
