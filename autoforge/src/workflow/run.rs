//! Workflow runtime execution types
//!
//! A [`WorkflowRun`] is the mutable record of one execution of a workflow
//! against a workspace: overall status, per-node step state, run-level
//! inputs, and the user-facing log. The persistence gateway exclusively owns
//! the serialized representation; everything here is a transient in-memory
//! copy valid for one drive cycle.

use crate::workflow::{NodeId, Workflow, WorkflowId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use ulid::Ulid;

/// Unique identifier for workflow runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Ulid);

impl RunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a RunId from a string representation
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| format!("Invalid run ID '{}': {}", s, e))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is currently executing
    Running,
    /// Run is suspended on at least one paused step
    Paused,
    /// Every node reached success or skipped
    Completed,
    /// A step failed and nothing is still running
    Failed,
    /// Externally forced terminal state, excluded from future scheduling
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal (no further scheduling)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    /// Whether the scheduler should still drive runs in this status
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Status of a single step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not yet picked by the readiness evaluator
    #[default]
    Pending,
    /// Currently executing (or being re-polled)
    Running,
    /// Finished successfully, outputs recorded
    Success,
    /// Finished with an error
    Failed,
    /// Suspended awaiting an external event
    Paused,
    /// Deliberately not executed
    Skipped,
}

impl StepStatus {
    /// Whether the step has finished (successfully or not)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Paused => "paused",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Why a paused step is suspended
///
/// Each pausing action records its variant here so resumption logic can
/// match exhaustively instead of sniffing output keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PauseReason {
    /// Awaiting a human yes/no through the UI or CLI
    AwaitingConfirmation,
    /// Awaiting a human-supplied value
    AwaitingInput,
    /// Awaiting spawned child runs to reach a terminal status
    #[serde(rename_all = "camelCase")]
    AwaitingChildren {
        /// IDs of the child runs this step is waiting on
        child_run_ids: Vec<RunId>,
    },
}

/// One user-facing log entry on a run, independent from technical step logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLogEntry {
    /// When the entry was appended
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Markdown content
    pub content: String,
    /// Step that produced the entry, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<NodeId>,
}

/// Per-node execution record within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionState {
    /// The node this state belongs to
    pub step_id: NodeId,
    /// Current status
    pub status: StepStatus,
    /// Resolved input values used for this attempt
    #[serde(default)]
    pub input_values: HashMap<String, Value>,
    /// Action outputs; populated on success, or on a paused step that
    /// deliberately exposes partial state (e.g. spawned child-run IDs)
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    /// Technical log lines, append-only across re-invocations
    #[serde(default)]
    pub logs: Vec<String>,
    /// Why the step is paused, when status is `Paused`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause: Option<PauseReason>,
    /// When the step first started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// When the step last finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Error message when the step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepExecutionState {
    /// Create a fresh pending state for a node
    pub fn new(step_id: NodeId) -> Self {
        Self {
            step_id,
            status: StepStatus::Pending,
            input_values: HashMap::new(),
            outputs: HashMap::new(),
            logs: Vec::new(),
            pause: None,
            start_time: None,
            end_time: None,
            error: None,
        }
    }
}

/// Runtime execution record for a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    /// Unique identifier for this run
    pub id: RunId,
    /// The workflow being executed
    pub workflow_id: WorkflowId,
    /// The workspace the run executes against
    pub workspace_id: WorkspaceId,
    /// Run status
    pub status: RunStatus,
    /// Per-node execution state, keyed by node ID
    #[serde(default)]
    pub steps: HashMap<NodeId, StepExecutionState>,
    /// Free-form variables for this run
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Run-level input values supplied at launch, readable via `input.<name>`
    #[serde(default)]
    pub input_values: HashMap<String, Value>,
    /// When the run started
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// When the run reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Human-readable description, mutable mid-run by actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered user-facing log entries
    #[serde(default)]
    pub user_logs: Vec<UserLogEntry>,
}

impl WorkflowRun {
    /// Create a new run for a workflow, starting in `Running` with empty steps
    pub fn new(workflow: &Workflow, workspace_id: WorkspaceId) -> Self {
        Self {
            id: RunId::new(),
            workflow_id: workflow.id.clone(),
            workspace_id,
            status: RunStatus::Running,
            steps: HashMap::new(),
            variables: HashMap::new(),
            input_values: HashMap::new(),
            start_time: chrono::Utc::now(),
            end_time: None,
            description: None,
            user_logs: Vec::new(),
        }
    }

    /// Set the launch-time input values, applying workflow-declared defaults
    /// for inputs the caller did not supply
    pub fn with_input_values(
        mut self,
        workflow: &Workflow,
        mut values: HashMap<String, Value>,
    ) -> Self {
        for input in &workflow.inputs {
            if !values.contains_key(&input.name) {
                if let Some(default) = &input.default_value {
                    values.insert(input.name.clone(), default.clone());
                }
            }
        }
        self.input_values = values;
        self
    }

    /// Look up a step's state
    pub fn step(&self, id: &NodeId) -> Option<&StepExecutionState> {
        self.steps.get(id)
    }

    /// Whether any step currently has the given status
    pub fn any_step(&self, status: StepStatus) -> bool {
        self.steps.values().any(|s| s.status == status)
    }

    /// Steps currently in the given status
    pub fn steps_with_status(&self, status: StepStatus) -> Vec<&StepExecutionState> {
        self.steps
            .values()
            .filter(|s| s.status == status)
            .collect()
    }
}

/// Partial update to a run, merged by the persistence gateway
///
/// `steps` merges per node ID; the scalar fields replace. The gateway stamps
/// `end_time` when `status` moves to a terminal value and clears it
/// otherwise, mirroring how the run table keeps its structured columns.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    /// New run status
    pub status: Option<RunStatus>,
    /// New description
    pub description: Option<String>,
    /// Replacement user log list
    pub user_logs: Option<Vec<UserLogEntry>>,
    /// Step states to merge in, keyed by node ID
    pub steps: Option<HashMap<NodeId, StepExecutionState>>,
}

impl RunPatch {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run status
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the run description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the user log list
    pub fn with_user_logs(mut self, user_logs: Vec<UserLogEntry>) -> Self {
        self.user_logs = Some(user_logs);
        self
    }

    /// Merge in a single step state
    pub fn with_step(mut self, step: StepExecutionState) -> Self {
        self.steps
            .get_or_insert_with(HashMap::new)
            .insert(step.step_id.clone(), step);
        self
    }

    /// Apply this patch to an in-memory run
    pub fn apply_to(&self, run: &mut WorkflowRun) {
        if let Some(steps) = &self.steps {
            for (id, state) in steps {
                run.steps.insert(id.clone(), state.clone());
            }
        }
        if let Some(description) = &self.description {
            run.description = Some(description.clone());
        }
        if let Some(user_logs) = &self.user_logs {
            run.user_logs = user_logs.clone();
        }
        if let Some(status) = self.status {
            run.status = status;
            run.end_time = if status.is_terminal() {
                Some(chrono::Utc::now())
            } else {
                None
            };
        }
    }
}
