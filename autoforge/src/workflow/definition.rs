//! Workflow definition types and validation
//!
//! A workflow is the immutable-between-edits graph the builder produces:
//! action nodes wired by directed edges, plus the typed inputs a run may be
//! launched with. The engine only ever reads these.

use crate::workflow::graph;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur when creating workflow-related types
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Workflow ID cannot be empty or whitespace only
    #[error("Workflow ID cannot be empty or whitespace only")]
    EmptyWorkflowId,

    /// Node ID cannot be empty or whitespace only
    #[error("Node ID cannot be empty or whitespace only")]
    EmptyNodeId,
}

/// Result type for workflow operations
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

/// Unique identifier for workflows, minted by the builder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Create a new workflow ID
    ///
    /// # Panics
    /// Panics if the ID is empty or whitespace only. For non-panicking
    /// creation, use `try_new` instead.
    pub fn new(id: impl Into<String>) -> Self {
        Self::try_new(id).expect("Workflow ID cannot be empty or whitespace only")
    }

    /// Create a new workflow ID, returning an error for invalid input
    pub fn try_new(id: impl Into<String>) -> WorkflowResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(WorkflowError::EmptyWorkflowId);
        }
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a node within a workflow graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new node ID
    ///
    /// # Panics
    /// Panics if the ID is empty or whitespace only. For non-panicking
    /// creation, use `try_new` instead.
    pub fn new(id: impl Into<String>) -> Self {
        Self::try_new(id).expect("Node ID cannot be empty or whitespace only")
    }

    /// Create a new node ID, returning an error for invalid input
    pub fn try_new(id: impl Into<String>) -> WorkflowResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(WorkflowError::EmptyNodeId);
        }
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed context values a node input can be wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextSource {
    /// The workspace's working directory path
    #[serde(rename = "workingDir")]
    WorkingDir,
    /// The workspace's identifier
    #[serde(rename = "workspaceId")]
    WorkspaceId,
}

/// How a single declared input parameter of a node gets its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum InputMapping {
    /// A literal configured value; strings pass through `{{ path }}`
    /// template substitution at resolution time
    Constant(Value),
    /// A fixed workspace context value, no templating
    Context(ContextSource),
    /// Another step's output, addressed as `"<stepId>.<outputKey>"`
    Variable(String),
}

/// One configured action instance in the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Unique identifier within the workflow
    pub id: NodeId,
    /// Display label from the builder
    pub label: String,
    /// Action-type identifier resolved through the action registry
    pub action_id: String,
    /// Declared input mappings, keyed by parameter name
    #[serde(default)]
    pub input_mappings: HashMap<String, InputMapping>,
}

/// A directed dependency edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    /// Source node ID
    pub source: NodeId,
    /// Target node ID; the target cannot start until the source succeeds
    pub target: NodeId,
}

/// Type of a run-level workflow input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Free-form text
    #[default]
    Text,
    /// Numeric value
    Number,
    /// Boolean flag
    Boolean,
    /// Reference to an uploaded image
    Image,
}

/// A typed input the workflow accepts at launch time, readable from
/// templates via `input.<name>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput {
    /// Input name
    pub name: String,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Value type
    #[serde(rename = "type", default)]
    pub input_type: InputType,
    /// Default value when the launcher supplies none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// Main workflow representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique identifier
    pub id: WorkflowId,
    /// Human-readable name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// All nodes in the graph
    pub nodes: Vec<WorkflowNode>,
    /// All directed edges in the graph
    pub edges: Vec<WorkflowEdge>,
    /// Declared run-level inputs
    #[serde(default)]
    pub inputs: Vec<WorkflowInput>,
    /// When the workflow was created
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When the workflow was last edited
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Workflow {
    /// Create a new empty workflow
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            inputs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a node by ID
    pub fn node(&self, id: &NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Add a node to the workflow
    pub fn add_node(&mut self, node: WorkflowNode) {
        self.nodes.push(node);
    }

    /// Add an edge to the workflow
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) {
        self.edges.push(WorkflowEdge { source, target });
    }

    /// Entry points: nodes with no incoming edges
    pub fn entry_points(&self) -> Vec<&WorkflowNode> {
        let targets: HashSet<&NodeId> = self.edges.iter().map(|e| &e.target).collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(&n.id))
            .collect()
    }

    /// Validate the workflow structure
    ///
    /// Checks node ID uniqueness, edge endpoint existence, the presence of
    /// an entry point, and rejects cyclic graphs. Run by the builder at
    /// save time so a cycle never reaches the execution engine.
    pub fn validate_structure(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Workflow name cannot be empty".to_string());
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                errors.push(format!("Duplicate node ID: '{}'", node.id));
            }
        }

        for edge in &self.edges {
            if self.node(&edge.source).is_none() {
                errors.push(format!(
                    "Edge references non-existent source node: '{}'",
                    edge.source
                ));
            }
            if self.node(&edge.target).is_none() {
                errors.push(format!(
                    "Edge references non-existent target node: '{}'",
                    edge.target
                ));
            }
        }

        if !self.nodes.is_empty() && self.entry_points().is_empty() {
            errors.push(
                "Workflow has no entry point. At least one node must have no incoming edges"
                    .to_string(),
            );
        }

        if let Some(cycle) = graph::find_cycle(self) {
            let path: Vec<&str> = cycle.iter().map(|n| n.as_str()).collect();
            errors.push(format!("Workflow contains a cycle: {}", path.join(" -> ")));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_helpers::*;

    #[test]
    fn test_node_id_creation() {
        let id1 = NodeId::new("checkout");
        let id2 = NodeId::from("checkout");
        let id3: NodeId = "checkout".into();

        assert_eq!(id1, id2);
        assert_eq!(id2, id3);
        assert_eq!(id1.as_str(), "checkout");
    }

    #[test]
    fn test_node_id_try_new_empty_error() {
        assert!(NodeId::try_new("").is_err());
        assert!(NodeId::try_new("   ").is_err());
    }

    #[test]
    #[should_panic(expected = "Node ID cannot be empty or whitespace only")]
    fn test_node_id_new_panics_on_empty() {
        NodeId::new("");
    }

    #[test]
    fn test_input_mapping_serialization() {
        let mapping = InputMapping::Constant(serde_json::json!("{{ workspace.workingDirectory }}"));
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["type"], "constant");

        let parsed: InputMapping =
            serde_json::from_value(serde_json::json!({"type": "context", "value": "workingDir"}))
                .unwrap();
        assert_eq!(parsed, InputMapping::Context(ContextSource::WorkingDir));

        let parsed: InputMapping = serde_json::from_value(
            serde_json::json!({"type": "variable", "value": "step-1.stdout"}),
        )
        .unwrap();
        assert_eq!(parsed, InputMapping::Variable("step-1.stdout".to_string()));
    }

    #[test]
    fn test_workflow_validation_success() {
        let workflow = create_linear_workflow();
        assert!(workflow.validate_structure().is_ok());
    }

    #[test]
    fn test_workflow_validation_bad_edge() {
        let mut workflow = create_linear_workflow();
        workflow.add_edge(NodeId::new("step-2"), NodeId::new("ghost"));

        let errors = workflow.validate_structure().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("ghost")));
    }

    #[test]
    fn test_workflow_validation_duplicate_node() {
        let mut workflow = create_linear_workflow();
        workflow.add_node(create_node("step-1", "run-command"));

        let errors = workflow.validate_structure().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Duplicate node ID")));
    }

    #[test]
    fn test_workflow_validation_rejects_cycle() {
        let mut workflow = Workflow::new(WorkflowId::new("wf-cycle"), "Cyclic");
        workflow.add_node(create_node("a", "run-command"));
        workflow.add_node(create_node("b", "run-command"));
        workflow.add_edge(NodeId::new("a"), NodeId::new("b"));
        workflow.add_edge(NodeId::new("b"), NodeId::new("a"));

        let errors = workflow.validate_structure().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn test_entry_points() {
        let workflow = create_linear_workflow();
        let entries = workflow.entry_points();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_str(), "step-1");
    }

    #[test]
    fn test_workflow_serialization_round_trip() {
        let workflow = create_linear_workflow();
        let json = serde_json::to_string(&workflow).unwrap();
        let parsed: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(workflow, parsed);
    }
}
