//! Configuration loading from `.arxgraph.toml`.
//!
//! Configuration is optional. Without a file every setting uses its default.
//!
//! # Example Configuration
//!
//! ```toml
//! [extract]
//! name_key = "SHORT-NAME"
//! id_attribute = "UUID"
//! reference_suffixes = ["-REF", "-TREF"]
//! container_suffixes = ["-REFS", "-IREF"]
//! virtual_policy = "reuse-real"
//!
//! [store]
//! database = ".arxgraph/graph.duckdb"
//!
//! [output]
//! format = "table"
//! color = true
//! ```

use anyhow::{Context, Result};
use arxgraph_core::ExtractConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".arxgraph.toml";

/// Database location used when neither the flag nor the config sets one.
pub const DEFAULT_DATABASE: &str = ".arxgraph/graph.duckdb";

/// Root configuration structure loaded from `.arxgraph.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct ArxConfig {
    /// Extraction rules (tag names, reference suffixes, virtual policy).
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Graph database location.
    #[serde(default)]
    pub store: StoreSettings,

    /// Output formatting preferences.
    #[serde(default)]
    pub output: OutputSettings,
}

/// Graph database settings.
#[derive(Debug, Deserialize, Default)]
pub struct StoreSettings {
    /// Path to the DuckDB file, relative to the working directory.
    #[serde(default)]
    pub database: Option<String>,
}

/// Output formatting preferences.
///
/// Command-line flags (e.g., `--format json`) override these settings.
#[derive(Debug, Deserialize, Default)]
pub struct OutputSettings {
    /// Valid values: `table`, `json`
    #[serde(default)]
    pub format: Option<String>,

    /// Defaults to auto-detection.
    #[serde(default)]
    pub color: Option<bool>,
}

impl ArxConfig {
    /// Load configuration from `.arxgraph.toml` in the given directory.
    ///
    /// If the config file doesn't exist or can't be parsed, returns defaults.
    /// Parse errors are logged as warnings but don't cause failures.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", CONFIG_FILE, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", CONFIG_FILE, e);
                }
            }
        }
        Self::default()
    }

    /// Like [`ArxConfig::load`], but a file that exists and can't be read or
    /// parsed is an error.
    pub fn load_strict(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Database path: explicit flag, then config, then the default location.
    pub fn database_path(&self, root: &Path, flag: Option<&Path>) -> PathBuf {
        match (flag, self.store.database.as_deref()) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(configured)) => root.join(configured),
            (None, None) => root.join(DEFAULT_DATABASE),
        }
    }

    /// Get the default output format, if configured.
    pub fn default_format(&self) -> Option<&str> {
        self.output.format.as_deref()
    }

    /// Returns the configured value, or `None` to use auto-detection.
    pub fn use_color(&self) -> Option<bool> {
        self.output.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arxgraph_core::VirtualPolicy;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ArxConfig::default();
        assert_eq!(config.extract, ExtractConfig::default());
        assert!(config.store.database.is_none());
        assert!(config.output.format.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[extract]
id_attribute = "ID"
reference_suffixes = ["-REF"]
virtual_policy = "shadow"

[store]
database = "out/graph.duckdb"

[output]
format = "json"
color = false
"#;
        let config: ArxConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.extract.id_attribute, "ID");
        assert_eq!(config.extract.reference_suffixes, vec!["-REF"]);
        assert_eq!(config.extract.virtual_policy, VirtualPolicy::Shadow);
        // Unset keys keep their defaults
        assert_eq!(config.extract.name_key, "SHORT-NAME");

        assert_eq!(
            config.database_path(Path::new("/work"), None),
            PathBuf::from("/work/out/graph.duckdb")
        );
        assert_eq!(config.default_format(), Some("json"));
        assert_eq!(config.use_color(), Some(false));
    }

    #[test]
    fn test_database_path_precedence() {
        let config = ArxConfig::default();
        let root = Path::new("/work");
        assert_eq!(
            config.database_path(root, None),
            PathBuf::from("/work/.arxgraph/graph.duckdb")
        );
        assert_eq!(
            config.database_path(root, Some(Path::new("other.duckdb"))),
            PathBuf::from("other.duckdb")
        );
    }

    #[test]
    fn test_invalid_file_falls_back_unless_strict() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[extract\nname_key = 1").unwrap();

        let config = ArxConfig::load(dir.path());
        assert_eq!(config.extract, ExtractConfig::default());

        let err = ArxConfig::load_strict(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        assert!(ArxConfig::load_strict(dir.path()).is_ok());
    }
}
