//! Export command - dump the stored graph as JSON

use anyhow::{Context, Result};
use arxgraph_store::DuckStore;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ArxConfig;

/// Run the export command. Writes to `output` when given, else stdout.
pub fn run(database: Option<&Path>, output: Option<PathBuf>, config: &ArxConfig) -> Result<()> {
    let db_path = config.database_path(Path::new("."), database);
    if !db_path.exists() {
        anyhow::bail!(
            "No graph database at {}. Run 'arxgraph import' first.",
            db_path.display()
        );
    }

    let store = DuckStore::open_read_only(&db_path)?;
    let graph = store.load_graph()?;
    let json = serde_json::to_string_pretty(&graph)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                nodes = graph.nodes.len(),
                virtual_nodes = graph.virtual_nodes.len(),
                relationships = graph.relationships.len(),
                "Exported graph to {}",
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
