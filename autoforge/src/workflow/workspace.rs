//! Workspace types
//!
//! A workspace is the working-directory context a run executes against. Its
//! lifetime is independent of any run; many runs may reference one workspace.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for workspaces, minted by the builder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Create a new workspace ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for WorkspaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkspaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An execution context: an identifier plus a working-directory path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Unique identifier
    pub id: WorkspaceId,
    /// Human-readable name
    pub name: String,
    /// Directory runs execute in; created on demand by the run driver
    pub working_directory: PathBuf,
    /// When the workspace was created
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Workspace {
    /// Create a new workspace
    pub fn new(
        id: WorkspaceId,
        name: impl Into<String>,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            working_directory: working_directory.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
