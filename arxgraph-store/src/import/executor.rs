//! Runs a [`WritePlan`] against a store inside one session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use arxgraph_core::{WritePlan, WriteStep};
use tracing::{debug, info};

use super::ImportError;
use crate::storage::{GraphStore, StoreSession};

/// What a committed plan wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub steps: usize,
    pub nodes_written: usize,
    pub relationships_written: usize,
    pub duration: Duration,
}

/// Execute every step of `plan` in one transaction and commit it.
///
/// `cancel` is checked before each step. On cancellation or any store error
/// the session is dropped uncommitted, leaving the previous graph intact.
pub fn execute_plan<S: GraphStore>(
    store: &S,
    plan: &WritePlan,
    cancel: &AtomicBool,
) -> Result<ExecutionReport, ImportError> {
    let start = Instant::now();
    let mut session = store.begin().map_err(ImportError::persistence)?;
    let mut report = ExecutionReport::default();

    for step in plan.steps() {
        if cancel.load(Ordering::SeqCst) {
            info!(completed = report.steps, "Import cancelled, rolling back");
            return Err(ImportError::Cancelled);
        }
        debug!("Plan step: {}", step);
        let (nodes, relationships) = run_step(&mut session, step)
            .with_context(|| format!("Failed to {}", step))
            .map_err(ImportError::persistence)?;
        report.nodes_written += nodes;
        report.relationships_written += relationships;
        report.steps += 1;
    }

    if cancel.load(Ordering::SeqCst) {
        info!("Import cancelled before commit, rolling back");
        return Err(ImportError::Cancelled);
    }
    session.commit().map_err(ImportError::persistence)?;

    report.duration = start.elapsed();
    info!(
        steps = report.steps,
        nodes = report.nodes_written,
        relationships = report.relationships_written,
        duration_ms = report.duration.as_millis() as u64,
        "Write plan committed"
    );
    Ok(report)
}

/// Returns `(nodes written, relationships written)`.
fn run_step<T: StoreSession>(session: &mut T, step: &WriteStep) -> anyhow::Result<(usize, usize)> {
    match step {
        WriteStep::ClearAll => session.clear_all().map(|()| (0, 0)),
        WriteStep::EnsureIndexes => session.ensure_indexes().map(|()| (0, 0)),
        WriteStep::UpsertNodes { label, nodes } => {
            session.upsert_nodes(label, nodes).map(|n| (n, 0))
        }
        WriteStep::UpsertVirtualNodes { nodes } => session
            .upsert_nodes(arxgraph_core::VIRTUAL_LABEL, nodes)
            .map(|n| (n, 0)),
        WriteStep::UpsertRelationships {
            rel_type,
            relationships,
        } => session
            .upsert_relationships(rel_type, relationships)
            .map(|n| (0, n)),
        WriteStep::WriteImportRecord(record) => session.write_import_record(record).map(|()| (0, 0)),
    }
}
