//! arxgraph core - structural extraction engine.
//!
//! Turns hierarchical system-description documents (AUTOSAR-style element
//! trees with cross-document references) into a typed property graph.
//!
//! # Pipeline
//!
//! ```text
//! documents -> merge -> extract (nodes, containment, pending refs)
//!           -> resolve (reference edges, virtual chains) -> WritePlan
//! ```
//!
//! Everything in this crate is pure and synchronous. Persistence lives in
//! `arxgraph-store`.
//!
//! # Usage
//!
//! ```
//! use arxgraph_core::{analyze, Element, ExtractConfig};
//! use serde_json::json;
//!
//! let document = json!({
//!     "AUTOSAR": { "AR-PACKAGES": { "AR-PACKAGE": {
//!         "$": { "UUID": "pkg-1" },
//!         "SHORT-NAME": "Pkg1"
//!     } } }
//! });
//! let tree = Element::from_document(&document).unwrap();
//! let extraction = analyze(vec![tree], &ExtractConfig::default()).unwrap();
//! assert_eq!(extraction.nodes[0].path(), Some("/Pkg1"));
//! ```

pub mod config;
pub mod element;
pub mod error;
pub mod extract;
pub mod merge;
pub mod model;
pub mod plan;
pub mod resolve;

use tracing::info;

pub use config::{ExtractConfig, VirtualPolicy};
pub use element::Element;
pub use error::{ExtractError, Result};
pub use extract::{extract, normalize_key, ExtractionContext};
pub use merge::{is_empty_merge, merge};
pub use model::{
    Extraction, ExtractionCounts, GraphNode, ImportRecord, NodeKey, PendingReference, Properties,
    Relationship, RelationshipSet, UnresolvedReason, UnresolvedReference, VIRTUAL_LABEL,
};
pub use plan::{WritePlan, WriteStep};
pub use resolve::{resolve, Resolution};

/// Merge, extract and resolve a set of documents.
///
/// An empty merge yields an empty [`Extraction`]. Use [`merge`] and
/// [`is_empty_merge`] directly when the caller must tell the two apart.
pub fn analyze(trees: Vec<Element>, config: &ExtractConfig) -> Result<Extraction> {
    let merged = merge(trees, config)?;
    if is_empty_merge(&merged, config) {
        info!("No top-level packages in input, nothing to extract");
        return Ok(Extraction::default());
    }
    Ok(analyze_merged(&merged, config))
}

/// Extract and resolve an already merged tree.
pub fn analyze_merged(merged: &Element, config: &ExtractConfig) -> Extraction {
    let (nodes, mut relationships, pending) = extract(merged, config).into_parts();
    let resolution = resolve(&nodes, &pending, config);
    relationships.extend(resolution.relationships);

    let extraction = Extraction {
        nodes,
        virtual_nodes: resolution.virtual_nodes,
        relationships: relationships.into_vec(),
        unresolved: resolution.unresolved,
    };

    let counts = extraction.counts();
    info!(
        nodes = counts.nodes,
        virtual_nodes = counts.virtual_nodes,
        relationships = counts.relationships,
        unresolved = counts.unresolved,
        "Extraction complete"
    );
    extraction
}
