//! Extraction settings.
//!
//! Every tag and attribute name the extractor keys on lives here, so the same
//! engine can be pointed at schema variants without code changes. The
//! defaults match AUTOSAR ARXML as produced by an XML-to-object converter.

use serde::{Deserialize, Serialize};

/// How unresolved reference targets are turned into placeholder chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VirtualPolicy {
    /// Link to an existing real node when a prefix of the target path matches
    /// one, and only synthesize the segments that are genuinely missing.
    #[default]
    ReuseReal,
    /// Synthesize a virtual node for every segment of the target path, even
    /// where a real node already sits at that path.
    Shadow,
}

impl VirtualPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VirtualPolicy::ReuseReal => "reuse-real",
            VirtualPolicy::Shadow => "shadow",
        }
    }
}

/// Settings controlling which elements become nodes and which children are
/// references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Child tag carrying an element's name.
    pub name_key: String,
    /// Attribute carrying an element's unique identifier.
    pub id_attribute: String,
    /// Attribute on a reference child declaring the destination type.
    pub dest_attribute: String,
    /// Tag every input document must have at its root.
    pub root_tag: String,
    /// Top-level collection whose packages are merged across documents.
    pub collection_key: String,
    /// Package tag inside the top-level collection.
    pub package_key: String,
    /// Suffixes marking a child as a single-target pointer.
    pub reference_suffixes: Vec<String>,
    /// Suffixes marking a child as a container of pointers. These win over
    /// `reference_suffixes` and are walked as ordinary structure.
    pub container_suffixes: Vec<String>,
    /// Relationship type used for parent/child containment.
    pub containment_type: String,
    /// Placeholder strategy for unresolved targets.
    pub virtual_policy: VirtualPolicy,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            name_key: "SHORT-NAME".to_string(),
            id_attribute: "UUID".to_string(),
            dest_attribute: "DEST".to_string(),
            root_tag: "AUTOSAR".to_string(),
            collection_key: "AR-PACKAGES".to_string(),
            package_key: "AR-PACKAGE".to_string(),
            reference_suffixes: vec!["-REF".to_string(), "-TREF".to_string()],
            container_suffixes: vec!["-REFS".to_string(), "-IREF".to_string()],
            containment_type: "CONTAINS".to_string(),
            virtual_policy: VirtualPolicy::default(),
        }
    }
}

impl ExtractConfig {
    /// Whether a child key is a terminal single-target reference.
    pub fn is_reference_key(&self, key: &str) -> bool {
        let key = key.to_ascii_uppercase();
        let matches = |suffix: &String| key.ends_with(&suffix.to_ascii_uppercase());
        self.reference_suffixes.iter().any(matches) && !self.container_suffixes.iter().any(matches)
    }

    pub fn with_virtual_policy(mut self, policy: VirtualPolicy) -> Self {
        self.virtual_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_keys() {
        let config = ExtractConfig::default();
        assert!(config.is_reference_key("TYPE-TREF"));
        assert!(config.is_reference_key("REQUIRED-INTERFACE-TREF"));
        assert!(config.is_reference_key("TARGET-DATA-PROTOTYPE-REF"));
        assert!(config.is_reference_key("port-ref"));
    }

    #[test]
    fn test_container_keys_are_structural() {
        let config = ExtractConfig::default();
        assert!(!config.is_reference_key("DATA-ELEMENT-REFS"));
        assert!(!config.is_reference_key("TARGET-IREF"));
        assert!(!config.is_reference_key("SHORT-NAME"));
    }

    #[test]
    fn test_container_suffix_wins_over_reference_suffix() {
        let config = ExtractConfig {
            reference_suffixes: vec!["REF".to_string()],
            ..ExtractConfig::default()
        };
        assert!(config.is_reference_key("PORT-REF"));
        assert!(!config.is_reference_key("CONTEXT-IREF"));
    }

    #[test]
    fn test_virtual_policy_names() {
        let policy: VirtualPolicy = serde_json::from_str("\"shadow\"").unwrap();
        assert_eq!(policy, VirtualPolicy::Shadow);
        assert_eq!(VirtualPolicy::default().as_str(), "reuse-real");
    }
}
