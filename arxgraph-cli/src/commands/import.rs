//! Import command - replace the stored graph with the given documents
//!
//! Reads every input, merges them into one forest, extracts and resolves the
//! graph, then writes it to the DuckDB store in a single transaction.

use anyhow::{Context, Result};
use arxgraph_core::VirtualPolicy;
use arxgraph_store::{DuckStore, ImportPipeline, ImportSummary};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ArxConfig;
use crate::input::read_batch;
use crate::output::{rows_table, Output, OutputFormat, TableDisplay};

/// Rows of the unresolved table shown before truncating.
const UNRESOLVED_PREVIEW: usize = 20;

/// Outcome of `arxgraph import`.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub database: String,
    pub documents: usize,
    #[serde(flatten)]
    pub summary: ImportSummary,
    pub duration_ms: u64,
}

impl TableDisplay for ImportReport {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();

        if !self.summary.success {
            lines.push(format!("{}", "Import failed".red().bold()));
            if let Some(error) = &self.summary.error {
                lines.push(format!("  {}: {}", "Error".cyan(), error));
            }
            lines.push(format!(
                "  {}: {} (unchanged)",
                "Database".cyan(),
                self.database
            ));
            return lines.join("\n");
        }

        match &self.summary.import_id {
            Some(id) => lines.push(format!("{} {}", "Import complete".green().bold(), id.dimmed())),
            None => lines.push(format!(
                "{}",
                "Nothing to import: no top-level packages".yellow().bold()
            )),
        }
        lines.push(format!("  {}: {}", "Database".cyan(), self.database));
        lines.push(format!("  {}: {}", "Documents".cyan(), self.documents));
        lines.push(format!("  {}: {}", "Nodes".cyan(), self.summary.node_count));
        lines.push(format!(
            "  {}: {}",
            "Virtual nodes".cyan(),
            self.summary.virtual_node_count
        ));
        lines.push(format!(
            "  {}: {}",
            "Relationships".cyan(),
            self.summary.relationship_count
        ));
        lines.push(format!(
            "  {}: {}",
            "Unresolved".cyan(),
            self.summary.unresolved_count
        ));
        lines.push(format!("  {}: {}ms", "Duration".cyan(), self.duration_ms));

        if !self.summary.unresolved.is_empty() {
            let rows = self
                .summary
                .unresolved
                .iter()
                .take(UNRESOLVED_PREVIEW)
                .map(|u| vec![u.source_id.clone(), u.rel_type.clone(), u.target_path.clone()])
                .collect();
            lines.push(String::new());
            lines.push(rows_table(&["Source", "Type", "Target"], rows));
            if self.summary.unresolved.len() > UNRESOLVED_PREVIEW {
                lines.push(format!(
                    "  ... and {} more (use --format json for all)",
                    self.summary.unresolved.len() - UNRESOLVED_PREVIEW
                ));
            }
        }

        lines.join("\n")
    }
}

/// Run the import command.
pub async fn run(
    inputs: &[PathBuf],
    database: Option<&Path>,
    policy: Option<VirtualPolicy>,
    config: ArxConfig,
    format: OutputFormat,
) -> Result<()> {
    let start = Instant::now();
    let root = Path::new(".");
    let db_path = config.database_path(root, database);

    let batch = read_batch(inputs)?;
    let documents = batch.len();

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = DuckStore::open(&db_path)?;

    let mut extract = config.extract;
    if let Some(policy) = policy {
        extract = extract.with_virtual_policy(policy);
    }

    let pipeline = ImportPipeline::new(store, extract);
    let summary = pipeline.import(batch).await;
    let success = summary.success;

    let report = ImportReport {
        database: db_path.display().to_string(),
        documents,
        summary,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    Output::new(&report, format).render()?;

    if !success {
        anyhow::bail!("Import failed, stored graph left unchanged");
    }
    Ok(())
}
