//! Error types for arxgraph-core.

use thiserror::Error;

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors that abort an extraction before anything is persisted.
///
/// Unresolved references and empty merges are not errors; they are reported
/// through [`crate::Extraction`] and the merge helpers instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The element tree is not well-formed enough to extract.
    #[error("Malformed input: {reason}")]
    MalformedInput {
        /// What was wrong with the input.
        reason: String,
    },
}

impl ExtractError {
    /// Shorthand for [`ExtractError::MalformedInput`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        ExtractError::MalformedInput {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExtractError::malformed("document has no root element");
        assert_eq!(
            err.to_string(),
            "Malformed input: document has no root element"
        );
    }
}
