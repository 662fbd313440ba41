//! Import pipeline implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use arxgraph_core::{
    analyze_merged, is_empty_merge, merge, Element, ExtractConfig, ExtractionCounts, ImportRecord,
    UnresolvedReference, WritePlan,
};

use super::{execute_plan, ImportError};
use crate::storage::GraphStore;

/// Documents for one import, each with a source identifier.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    trees: Vec<Element>,
    sources: Vec<String>,
}

impl ImportBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, source: impl Into<String>, tree: Element) -> Self {
        self.push(source, tree);
        self
    }

    pub fn push(&mut self, source: impl Into<String>, tree: Element) {
        self.sources.push(source.into());
        self.trees.push(tree);
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Split into `(trees, sources)`.
    pub fn into_parts(self) -> (Vec<Element>, Vec<String>) {
        (self.trees, self.sources)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Result of an import, successful or not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    pub node_count: usize,
    pub relationship_count: usize,
    pub virtual_node_count: usize,
    pub unresolved_count: usize,
    pub unresolved: Vec<UnresolvedReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportSummary {
    /// Successful import that found nothing to write.
    pub fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn completed(
        import_id: String,
        counts: ExtractionCounts,
        unresolved: Vec<UnresolvedReference>,
    ) -> Self {
        Self {
            success: true,
            import_id: Some(import_id),
            node_count: counts.nodes,
            relationship_count: counts.relationships,
            virtual_node_count: counts.virtual_nodes,
            unresolved_count: counts.unresolved,
            unresolved,
            error: None,
        }
    }

    /// Failed import carrying a single descriptive error.
    pub fn failure(error: &ImportError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Sets the flag if the import future is dropped before it finishes, so the
/// blocking writer stops at the next step and rolls back.
struct CancelOnDrop {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Pipeline turning document batches into a stored graph.
pub struct ImportPipeline<S> {
    store: Arc<Mutex<S>>,
    config: ExtractConfig,
}

impl<S> Clone for ImportPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: GraphStore> ImportPipeline<S> {
    /// Create a new import pipeline owning `store`.
    pub fn new(store: S, config: ExtractConfig) -> Self {
        Self::with_shared_store(Arc::new(Mutex::new(store)), config)
    }

    /// Create a pipeline over a store shared with other pipelines. Imports
    /// through any of them are serialized by the mutex.
    pub fn with_shared_store(store: Arc<Mutex<S>>, config: ExtractConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Import a batch, replacing the stored graph.
    pub async fn run(&self, batch: ImportBatch) -> Result<ImportSummary, ImportError> {
        self.run_with_cancel(batch, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Import a batch; setting `cancel` aborts the write before commit.
    pub async fn run_with_cancel(
        &self,
        batch: ImportBatch,
        cancel: Arc<AtomicBool>,
    ) -> Result<ImportSummary, ImportError> {
        let start = Instant::now();
        let ImportBatch { trees, sources } = batch;
        info!("Starting import of {} document(s)", trees.len());

        // 1. Merge into one forest so cross-document references resolve
        let merged = merge(trees, &self.config)?;
        if is_empty_merge(&merged, &self.config) {
            info!("No top-level packages in input, leaving store untouched");
            return Ok(ImportSummary::empty());
        }

        // 2. Extract and resolve
        let extraction = analyze_merged(&merged, &self.config);
        drop(merged);
        let counts = extraction.counts();
        let unresolved = extraction.unresolved.clone();

        // 3. Build the full-replace plan
        let record = ImportRecord::new(sources, &counts);
        let import_id = record.id.clone();
        let plan = WritePlan::build(extraction, record);
        info!("Built write plan with {} step(s)", plan.len());

        // 4. Write in one transaction
        let store = Arc::clone(&self.store).lock_owned().await;
        let guard = CancelOnDrop {
            flag: Arc::clone(&cancel),
            armed: true,
        };
        let report = tokio::task::spawn_blocking(move || execute_plan(&*store, &plan, &cancel))
            .await
            .map_err(|e| ImportError::TaskFailed(e.to_string()))??;
        guard.disarm();

        info!(
            import_id = %import_id,
            nodes = counts.nodes,
            virtual_nodes = counts.virtual_nodes,
            relationships = counts.relationships,
            unresolved = counts.unresolved,
            written_nodes = report.nodes_written,
            written_relationships = report.relationships_written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Import complete"
        );

        Ok(ImportSummary::completed(import_id, counts, unresolved))
    }

    /// Like [`ImportPipeline::run`], reporting failure in the summary.
    pub async fn import(&self, batch: ImportBatch) -> ImportSummary {
        match self.run(batch).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Import failed: {}", e);
                ImportSummary::failure(&e)
            }
        }
    }
}
