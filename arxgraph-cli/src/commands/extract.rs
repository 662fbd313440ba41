//! Extract command - run extraction and resolution without a database
//!
//! Useful for inspecting what an import would write. The table view shows
//! counts and unresolved references; the JSON view carries the full graph.

use anyhow::Result;
use arxgraph_core::{analyze, Extraction, ExtractionCounts, VirtualPolicy};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::ArxConfig;
use crate::input::read_batch;
use crate::output::{count_table, rows_table, Output, OutputFormat, TableDisplay};

/// Outcome of `arxgraph extract`.
#[derive(Debug, Serialize)]
pub struct ExtractReport {
    pub sources: Vec<String>,
    pub virtual_policy: String,
    pub counts: ExtractionCounts,
    #[serde(flatten)]
    pub extraction: Extraction,
}

impl ExtractReport {
    fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for node in self.extraction.nodes.iter() {
            *counts.entry(node.label.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for rel in self.extraction.relationships.iter() {
            *counts.entry(rel.rel_type.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl TableDisplay for ExtractReport {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{} {} document(s)",
            "Extracted".green().bold(),
            self.sources.len()
        ));
        lines.push(format!("  {}: {}", "Virtual policy".cyan(), self.virtual_policy));
        lines.push(format!("  {}: {}", "Nodes".cyan(), self.counts.nodes));
        lines.push(format!(
            "  {}: {}",
            "Virtual nodes".cyan(),
            self.counts.virtual_nodes
        ));
        lines.push(format!(
            "  {}: {}",
            "Relationships".cyan(),
            self.counts.relationships
        ));
        lines.push(format!("  {}: {}", "Unresolved".cyan(), self.counts.unresolved));

        lines.push(String::new());
        lines.push(format!("{}", "Labels".bold()));
        lines.push(count_table("Label", &self.label_counts()));

        lines.push(String::new());
        lines.push(format!("{}", "Relationship types".bold()));
        lines.push(count_table("Type", &self.type_counts()));

        if !self.extraction.unresolved.is_empty() {
            let rows = self
                .extraction
                .unresolved
                .iter()
                .map(|u| {
                    vec![
                        u.source_id.clone(),
                        u.rel_type.clone(),
                        u.target_path.clone(),
                        u.reason.to_string(),
                    ]
                })
                .collect();
            lines.push(String::new());
            lines.push(format!("{}", "Unresolved references".yellow().bold()));
            lines.push(rows_table(&["Source", "Type", "Target", "Reason"], rows));
        }

        lines.join("\n")
    }
}

/// Run the extract command.
pub fn run(
    inputs: &[PathBuf],
    policy: Option<VirtualPolicy>,
    config: ArxConfig,
    format: OutputFormat,
) -> Result<()> {
    let (trees, sources) = read_batch(inputs)?.into_parts();

    let mut extract = config.extract;
    if let Some(policy) = policy {
        extract = extract.with_virtual_policy(policy);
    }

    let extraction = analyze(trees, &extract)?;
    let report = ExtractReport {
        sources,
        virtual_policy: extract.virtual_policy.as_str().to_string(),
        counts: extraction.counts(),
        extraction,
    };
    Output::new(&report, format).render()
}
