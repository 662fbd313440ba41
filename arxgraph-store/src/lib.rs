//! arxgraph storage library.
//!
//! This library provides:
//! - Storage layer (transactional graph stores: DuckDB and in-memory)
//! - Import pipeline (merge, extract, resolve, then one atomic write)

pub mod import;
pub mod storage;

pub use import::{execute_plan, ExecutionReport, ImportBatch, ImportError, ImportPipeline, ImportSummary};
pub use storage::{DuckStore, GraphStats, GraphStore, MemoryStore, StoreSession};
