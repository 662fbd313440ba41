//! Loading input documents.
//!
//! Inputs are JSON files in the object shape an XML-to-object converter
//! produces: one root key, `"$"` for attributes, `"_"` for text. A directory
//! argument contributes every `.json` file directly inside it, in name order.
//!
//! JSON is parsed with serde_json's default recursion limit of 128 nested
//! arrays and objects. Deeper documents are rejected with a nesting error
//! rather than risking a stack overflow in the recursive tree walk.

use anyhow::{Context, Result};
use arxgraph_core::Element;
use arxgraph_store::ImportBatch;
use std::path::{Path, PathBuf};
use tracing::debug;

/// serde_json's nesting limit for arrays and objects.
pub const MAX_JSON_DEPTH: usize = 128;

/// Expand file and directory arguments into the list of input files.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();
            debug!("{} input file(s) in {}", entries.len(), path.display());
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        anyhow::bail!("No input documents found");
    }
    Ok(files)
}

/// Read and normalize one document.
pub fn read_document(path: &Path) -> Result<Element> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) if e.to_string().contains("recursion limit exceeded") => {
            anyhow::bail!(
                "{} nests deeper than {} levels, the supported JSON depth",
                path.display(),
                MAX_JSON_DEPTH
            )
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Invalid JSON in {}", path.display()));
        }
    };
    Element::from_document(&value).with_context(|| format!("Malformed document {}", path.display()))
}

/// Read every input into an import batch keyed by file path.
pub fn read_batch(paths: &[PathBuf]) -> Result<ImportBatch> {
    let mut batch = ImportBatch::new();
    for path in collect_inputs(paths)? {
        let tree = read_document(&path)?;
        batch.push(path.display().to_string(), tree);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_directory_expands_to_sorted_json_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(collect_inputs(&[dir.path().to_path_buf()]).is_err());
    }

    #[test]
    fn test_read_document_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_document(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_read_batch_keeps_sources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{ "AUTOSAR": { "AR-PACKAGES": {} } }"#).unwrap();

        let batch = read_batch(&[path.clone()]).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.sources(), &[path.display().to_string()]);
    }

    #[test]
    fn test_overly_deep_document_reports_depth_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deep.json");
        let depth = MAX_JSON_DEPTH + 10;
        let content = format!(
            "{{\"AUTOSAR\": {}{}}}",
            "{\"X\": ".repeat(depth),
            "}".repeat(depth)
        );
        std::fs::write(&path, content).unwrap();

        let err = read_document(&path).unwrap_err().to_string();
        assert!(err.contains("deep.json"), "{}", err);
        assert!(err.contains("nests deeper than 128 levels"), "{}", err);
    }

    #[test]
    fn test_document_within_depth_limit_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested.json");
        let depth = 100;
        let content = format!(
            "{{\"AUTOSAR\": {}null{}}}",
            "{\"X\": ".repeat(depth),
            "}".repeat(depth)
        );
        std::fs::write(&path, content).unwrap();

        assert!(read_document(&path).is_ok());
    }
}
