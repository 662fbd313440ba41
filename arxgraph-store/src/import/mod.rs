//! Import pipeline: documents in, one atomic graph replacement out.

mod error;
mod executor;
mod pipeline;

pub use error::ImportError;
pub use executor::{execute_plan, ExecutionReport};
pub use pipeline::{ImportBatch, ImportPipeline, ImportSummary};
