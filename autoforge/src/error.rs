//! Unified error handling for the AutoForge library
//!
//! This module provides the library-wide error type. Components with richer
//! failure vocabularies (actions, the executor) define their own error enums
//! and convert into this one at the crate boundary.

use std::io;
use thiserror::Error;

/// The main error type for the AutoForge library
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AutoForgeError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Workflow not found
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Workspace not found
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    /// Workflow run not found
    #[error("Workflow run not found: {0}")]
    RunNotFound(String),

    /// Workflow definition failed validation
    #[error("Invalid workflow '{name}': {reason}")]
    InvalidWorkflow {
        /// Name of the offending workflow
        name: String,
        /// Why validation rejected it
        reason: String,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// Result type for AutoForge operations
pub type Result<T> = std::result::Result<T, AutoForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoForgeError::WorkflowNotFound("deploy".to_string());
        assert_eq!(err.to_string(), "Workflow not found: deploy");

        let err = AutoForgeError::InvalidWorkflow {
            name: "broken".to_string(),
            reason: "edge references missing node".to_string(),
        };
        assert!(err.to_string().contains("broken"));
        assert!(err.to_string().contains("missing node"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: AutoForgeError = io_err.into();
        assert!(matches!(err, AutoForgeError::Io(_)));
    }
}
