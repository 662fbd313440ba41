//! Error types for the import pipeline.

use arxgraph_core::ExtractError;
use thiserror::Error;

/// Errors that fail a whole import batch.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Input trees could not be merged.
    #[error(transparent)]
    Malformed(#[from] ExtractError),

    /// The store rejected the write plan. Nothing was committed.
    #[error("Persistence failed: {message}")]
    Persistence {
        /// Full error chain of the store failure.
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The import was cancelled before commit. Nothing was committed.
    #[error("Import cancelled")]
    Cancelled,

    /// The blocking write task panicked or was aborted.
    #[error("Import task failed: {0}")]
    TaskFailed(String),
}

impl ImportError {
    pub(crate) fn persistence(error: anyhow::Error) -> Self {
        ImportError::Persistence {
            message: format!("{:#}", error),
            source: error.into(),
        }
    }
}
