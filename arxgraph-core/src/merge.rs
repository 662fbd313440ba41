//! Multi-document merger.
//!
//! Cross-file references only resolve when every document's packages sit in
//! one forest, so all inputs are folded under a single synthetic root before
//! the extraction walk.

use tracing::debug;

use crate::config::ExtractConfig;
use crate::element::Element;
use crate::error::{ExtractError, Result};

/// Concatenate the top-level packages of every document under one root.
///
/// Each input must have the configured root tag. Documents without a
/// top-level collection contribute nothing. Root attributes are taken from
/// the first document.
pub fn merge<I>(trees: I, config: &ExtractConfig) -> Result<Element>
where
    I: IntoIterator<Item = Element>,
{
    let mut root = Element::new(config.root_tag.as_str());
    let mut collection = Element::new(config.collection_key.as_str());

    for (position, tree) in trees.into_iter().enumerate() {
        if tree.tag != config.root_tag {
            return Err(ExtractError::malformed(format!(
                "document {} has root <{}>, expected <{}>",
                position + 1,
                tree.tag,
                config.root_tag
            )));
        }

        let Element {
            attributes,
            children,
            ..
        } = tree;

        if position == 0 {
            root.attributes = attributes;
        }

        let mut contributed = 0;
        for (key, group) in children {
            if key != config.collection_key {
                continue;
            }
            for mut packages in group {
                if let Some(slot) = packages
                    .children
                    .iter()
                    .position(|(tag, _)| *tag == config.package_key)
                {
                    let (_, group) = packages.children.swap_remove(slot);
                    contributed += group.len();
                    for package in group {
                        collection.push_child(package);
                    }
                }
            }
        }
        debug!(document = position + 1, packages = contributed, "Merged document");
    }

    root.push_child(collection);
    Ok(root)
}

/// Number of top-level packages in a merged tree.
pub fn top_level_count(merged: &Element, config: &ExtractConfig) -> usize {
    merged
        .children(&config.collection_key)
        .iter()
        .map(|collection| collection.children(&config.package_key).len())
        .sum()
}

/// A merge with no top-level packages is a successful no-op import.
pub fn is_empty_merge(merged: &Element, config: &ExtractConfig) -> bool {
    top_level_count(merged, config) == 0
}
