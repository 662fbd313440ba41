//! Stats command - summarize the stored graph
//!
//! Opens the database read-only and reports node, relationship and label
//! counts together with the record of the last import.

use anyhow::Result;
use arxgraph_store::{DuckStore, GraphStats};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::config::ArxConfig;
use crate::output::{count_table, Output, OutputFormat, TableDisplay};

/// Outcome of `arxgraph stats`.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub database: String,
    #[serde(flatten)]
    pub stats: GraphStats,
}

impl TableDisplay for StatsReport {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{}", "Graph Statistics".green().bold()));
        lines.push(format!("  {}: {}", "Database".cyan(), self.database));
        lines.push(format!("  {}: {}", "Nodes".cyan(), self.stats.node_count));
        lines.push(format!(
            "  {}: {}",
            "Virtual nodes".cyan(),
            self.stats.virtual_node_count
        ));
        lines.push(format!(
            "  {}: {}",
            "Relationships".cyan(),
            self.stats.relationship_count
        ));

        match &self.stats.last_import {
            Some(record) => {
                lines.push(String::new());
                lines.push(format!("{}", "Last import".bold()));
                lines.push(format!("  {}: {}", "Id".cyan(), record.id));
                lines.push(format!(
                    "  {}: {}",
                    "Imported at".cyan(),
                    record.imported_at.format("%Y-%m-%d %H:%M:%S UTC")
                ));
                lines.push(format!("  {}: {}", "Sources".cyan(), record.sources.len()));
                for source in &record.sources {
                    lines.push(format!("    {}", source.dimmed()));
                }
                lines.push(format!(
                    "  {}: {}",
                    "Unresolved".cyan(),
                    record.unresolved_count
                ));
            }
            None => {
                lines.push(String::new());
                lines.push(format!("{}", "No imports recorded".yellow()));
            }
        }

        lines.push(String::new());
        lines.push(format!("{}", "Labels".bold()));
        lines.push(count_table("Label", &self.stats.label_counts));

        lines.push(String::new());
        lines.push(format!("{}", "Relationship types".bold()));
        lines.push(count_table("Type", &self.stats.type_counts));

        lines.join("\n")
    }
}

/// Run the stats command.
pub fn run(database: Option<&Path>, config: &ArxConfig, format: OutputFormat) -> Result<()> {
    let db_path = config.database_path(Path::new("."), database);
    if !db_path.exists() {
        anyhow::bail!(
            "No graph database at {}. Run 'arxgraph import' first.",
            db_path.display()
        );
    }

    let store = DuckStore::open_read_only(&db_path)?;
    let report = StatsReport {
        database: db_path.display().to_string(),
        stats: store.stats()?,
    };
    Output::new(&report, format).render()
}
