//! Workflow execution engine
//!
//! The [`RunDriver`] turns a static workflow graph plus a live run record
//! into forward progress, one poll-driven cycle at a time.

pub mod core;

use crate::AutoForgeError;
use thiserror::Error;

/// Errors that can occur while driving a run
///
/// Action failures never appear here: they are recorded on the step and the
/// run, not raised. These are infrastructure failures only.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Persistence gateway failure
    #[error("Storage error: {0}")]
    Storage(#[from] AutoForgeError),
    /// Generic execution failure
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result type for executor operations
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;

// Re-export main types
pub use core::RunDriver;
