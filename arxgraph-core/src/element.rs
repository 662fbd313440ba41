//! Generic element tree consumed by the extractor.
//!
//! XML parsing happens outside this crate. Documents arrive in the object
//! shape produced by XML-to-object converters: attributes under `"$"`, text
//! under `"_"`, and every other key a child tag holding either one child or a
//! list of them. [`Element::from_json`] normalizes that shape exactly once, so
//! nothing downstream ever has to ask "one or many?" again.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ExtractError, Result};

const ATTRIBUTES_KEY: &str = "$";
const TEXT_KEY: &str = "_";

/// One parsed XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Children grouped by tag, in first-seen order. Groups are never empty.
    pub children: Vec<(String, Vec<Element>)>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    /// Append a child to the group for its tag, creating the group if needed.
    pub fn push_child(&mut self, child: Element) {
        match self.children.iter_mut().find(|(tag, _)| *tag == child.tag) {
            Some((_, group)) => group.push(child),
            None => self.children.push((child.tag.clone(), vec![child])),
        }
    }

    /// All children with the given tag.
    pub fn children(&self, tag: &str) -> &[Element] {
        self.children
            .iter()
            .find(|(key, _)| key == tag)
            .map(|(_, group)| group.as_slice())
            .unwrap_or(&[])
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Trimmed text content.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim)
    }

    /// Trimmed, non-empty text of the first child with the given tag.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.children(tag)
            .first()
            .and_then(Element::text)
            .filter(|text| !text.is_empty())
    }

    /// A leaf holding only text: no attributes, no children.
    pub fn is_pure_text(&self) -> bool {
        self.text.is_some() && self.attributes.is_empty() && self.children.is_empty()
    }

    /// Number of elements in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .flat_map(|(_, group)| group)
            .map(Element::subtree_len)
            .sum::<usize>()
    }

    /// Normalize a whole document: a JSON object with exactly one key, the
    /// root tag.
    pub fn from_document(document: &Value) -> Result<Self> {
        let object = document
            .as_object()
            .ok_or_else(|| ExtractError::malformed("document must be a JSON object"))?;

        let mut entries = object.iter();
        match (entries.next(), entries.next()) {
            (Some((tag, value)), None) => Self::from_json(tag, value),
            (None, _) => Err(ExtractError::malformed("document has no root element")),
            _ => Err(ExtractError::malformed(format!(
                "document has {} root elements, expected exactly one",
                object.len()
            ))),
        }
    }

    /// Normalize one element value.
    pub fn from_json(tag: &str, value: &Value) -> Result<Self> {
        let mut element = Element::new(tag);

        match value {
            Value::Null => {}
            Value::Array(_) => {
                return Err(ExtractError::malformed(format!(
                    "<{tag}> is a list where a single element was expected"
                )))
            }
            Value::Object(map) => {
                for (key, value) in map {
                    match key.as_str() {
                        ATTRIBUTES_KEY => element.attributes = parse_attributes(tag, value)?,
                        TEXT_KEY => {
                            element.text = Some(scalar_text(value).ok_or_else(|| {
                                ExtractError::malformed(format!("<{tag}> has non-scalar text"))
                            })?)
                        }
                        _ => {
                            let group = match value {
                                Value::Array(items) => items
                                    .iter()
                                    .map(|item| Self::from_json(key, item))
                                    .collect::<Result<Vec<_>>>()?,
                                single => vec![Self::from_json(key, single)?],
                            };
                            if !group.is_empty() {
                                element.children.push((key.clone(), group));
                            }
                        }
                    }
                }
            }
            scalar => element.text = scalar_text(scalar),
        }

        Ok(element)
    }
}

fn parse_attributes(tag: &str, value: &Value) -> Result<BTreeMap<String, String>> {
    let map = value
        .as_object()
        .ok_or_else(|| ExtractError::malformed(format!("<{tag}> attributes must be an object")))?;

    map.iter()
        .map(|(key, value)| {
            scalar_text(value)
                .map(|text| (key.clone(), text))
                .ok_or_else(|| {
                    ExtractError::malformed(format!("<{tag}> attribute {key} is not a scalar"))
                })
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
