//! Workflow action catalog
//!
//! Every action type pairs a static [`ActionDefinition`] (what the editor
//! shows: parameters, inputs, outputs) with an implementation of the
//! [`WorkflowAction`] trait. The step executor treats implementations
//! opaquely: it hands them resolved inputs plus an [`ExecutionContext`] and
//! interprets the returned [`ExecutionResult`].

mod command;
mod control;
mod data;
mod foreach;
mod git;
mod llm;
mod notify;

pub use command::{parse_command_line, RunCommandAction, COMMAND_TIMEOUT};
pub use control::{ConfirmAction, UserInputAction};
pub use data::{NewTempFolderAction, SplitStringAction};
pub use foreach::{ForEachFolderAction, ForEachListAction};
pub use git::GitCheckoutAction;
pub use llm::{AskChatGptAction, AskGeminiAction};
pub use notify::{AddLogAction, SetDescriptionAction};

use crate::workflow::{
    NodeId, PauseReason, RunId, RunPatch, Workflow, WorkflowId, WorkflowRun, Workspace,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during action execution
///
/// The step executor converts any of these into a failed step; actions are
/// not required to pre-validate inputs defensively, but are encouraged to.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A required input was missing or had the wrong type
    #[error("Missing or invalid input '{0}'")]
    InvalidInput(String),
    /// Action execution timed out
    #[error("Action execution timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded
        timeout: Duration,
    },
    /// Generic action execution error
    #[error("Action execution failed: {0}")]
    ExecutionError(String),
    /// IO error during action execution
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Persistence access through the context failed
    #[error("Storage error: {0}")]
    Storage(#[from] crate::AutoForgeError),
}

/// Result type for action operations
pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// Value type of an action parameter, input, or output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamType {
    /// Single-line string
    String,
    /// Numeric value
    Number,
    /// Boolean flag
    Boolean,
    /// Multi-line text
    Text,
    /// Arbitrary JSON value
    Json,
    /// Reference to another workflow
    WorkflowId,
}

/// A parameter configured at design time in the builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameter {
    /// Parameter name, the key in the resolved input map
    pub name: String,
    /// Display label
    pub label: String,
    /// Value type
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether the builder requires a value
    #[serde(default)]
    pub required: bool,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A runtime input wired from context or previous steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInputRequest {
    /// Input name
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub input_type: ParamType,
    /// Whether the action needs this to run
    #[serde(default)]
    pub required: bool,
    /// Help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An output the action exposes to downstream steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutputDefinition {
    /// Output name, the key in the step's output map
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub output_type: ParamType,
    /// Help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Static description of an action type, consumed by the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Unique action-type identifier, e.g. `git-checkout`
    pub id: String,
    /// Display name
    pub name: String,
    /// What the action does
    pub description: String,
    /// Design-time parameters
    pub parameters: Vec<ActionParameter>,
    /// Runtime inputs
    pub inputs: Vec<ActionInputRequest>,
    /// Produced outputs
    pub outputs: Vec<ActionOutputDefinition>,
}

/// Outcome of one action invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Action finished; outputs become the step's recorded outputs
    Success {
        /// Output values for downstream steps
        outputs: HashMap<String, Value>,
    },
    /// Action failed; outputs may still carry diagnostics (e.g. stderr)
    Failed {
        /// Error message recorded on the step
        error: String,
        /// Partial outputs kept for inspection
        outputs: HashMap<String, Value>,
    },
    /// Action is suspended awaiting an external event and will be re-polled
    Paused {
        /// Why the step is suspended
        reason: PauseReason,
        /// Partial state deliberately exposed while paused
        outputs: HashMap<String, Value>,
    },
}

/// What an action invocation returns to the step executor
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// The outcome variant
    pub outcome: ActionOutcome,
    /// Technical log lines appended to the step's log
    pub logs: Vec<String>,
}

impl ExecutionResult {
    /// Successful result with outputs
    pub fn success(outputs: HashMap<String, Value>, logs: Vec<String>) -> Self {
        Self {
            outcome: ActionOutcome::Success { outputs },
            logs,
        }
    }

    /// Failed result without diagnostic outputs
    pub fn failed(error: impl Into<String>, logs: Vec<String>) -> Self {
        Self {
            outcome: ActionOutcome::Failed {
                error: error.into(),
                outputs: HashMap::new(),
            },
            logs,
        }
    }

    /// Failed result that still exposes outputs for inspection
    pub fn failed_with_outputs(
        error: impl Into<String>,
        outputs: HashMap<String, Value>,
        logs: Vec<String>,
    ) -> Self {
        Self {
            outcome: ActionOutcome::Failed {
                error: error.into(),
                outputs,
            },
            logs,
        }
    }

    /// Paused result without extra outputs
    pub fn paused(reason: PauseReason, logs: Vec<String>) -> Self {
        Self {
            outcome: ActionOutcome::Paused {
                reason,
                outputs: HashMap::new(),
            },
            logs,
        }
    }

    /// Paused result exposing partial state
    pub fn paused_with_outputs(
        reason: PauseReason,
        outputs: HashMap<String, Value>,
        logs: Vec<String>,
    ) -> Self {
        Self {
            outcome: ActionOutcome::Paused { reason, outputs },
            logs,
        }
    }
}

/// Narrow persistence capabilities handed to actions
///
/// Actions that need side effects (logging, spawning children) get exactly
/// these four operations rather than the whole gateway, so the same action
/// logic works identically whether persistence is in-memory or file-backed.
pub trait RunStore: Send + Sync {
    /// Fetch a run by ID
    fn get_run(&self, id: &RunId) -> crate::Result<WorkflowRun>;
    /// Fetch a workflow by ID
    fn get_workflow(&self, id: &WorkflowId) -> crate::Result<Workflow>;
    /// Persist a newly created run
    fn create_run(&self, run: WorkflowRun) -> crate::Result<()>;
    /// Merge a partial update into a run
    fn update_run(&self, id: &RunId, patch: RunPatch) -> crate::Result<()>;
}

/// Everything an action implementation may touch during one invocation
#[derive(Clone)]
pub struct ExecutionContext {
    /// The workspace the run executes against
    pub workspace: Workspace,
    /// The workflow being executed
    pub workflow_id: WorkflowId,
    /// The run this step belongs to
    pub run_id: RunId,
    /// The step being executed
    pub step_id: NodeId,
    store: Arc<dyn RunStore>,
}

impl ExecutionContext {
    /// Create a new execution context
    pub fn new(
        workspace: Workspace,
        workflow_id: WorkflowId,
        run_id: RunId,
        step_id: NodeId,
        store: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            workspace,
            workflow_id,
            run_id,
            step_id,
            store,
        }
    }

    /// Fetch a run through the injected store
    pub fn get_run(&self, id: &RunId) -> crate::Result<WorkflowRun> {
        self.store.get_run(id)
    }

    /// Fetch a workflow through the injected store
    pub fn get_workflow(&self, id: &WorkflowId) -> crate::Result<Workflow> {
        self.store.get_workflow(id)
    }

    /// Persist a new (child) run through the injected store
    pub fn create_run(&self, run: WorkflowRun) -> crate::Result<()> {
        self.store.create_run(run)
    }

    /// Merge a partial update into a run through the injected store
    pub fn update_run(&self, id: &RunId, patch: RunPatch) -> crate::Result<()> {
        self.store.update_run(id, patch)
    }
}

/// Trait implemented by every action type
#[async_trait::async_trait]
pub trait WorkflowAction: Send + Sync {
    /// Static definition for the editor
    fn definition(&self) -> ActionDefinition;

    /// Execute the action with resolved inputs.
    ///
    /// Implementations that return `Paused` are re-invoked on every poll
    /// cycle and must be re-entrant: any state needed to resume (such as
    /// spawned child-run IDs) has to live in the step's persisted outputs
    /// and pause reason, not in memory.
    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult>;
}

/// Registry mapping action-type identifiers to implementations
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn WorkflowAction>>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Registry with the standard action catalog
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GitCheckoutAction));
        registry.register(Arc::new(RunCommandAction));
        registry.register(Arc::new(ConfirmAction));
        registry.register(Arc::new(UserInputAction));
        registry.register(Arc::new(SetDescriptionAction));
        registry.register(Arc::new(AddLogAction));
        registry.register(Arc::new(ForEachListAction));
        registry.register(Arc::new(ForEachFolderAction));
        registry.register(Arc::new(AskChatGptAction::new()));
        registry.register(Arc::new(AskGeminiAction::new()));
        registry.register(Arc::new(SplitStringAction));
        registry.register(Arc::new(NewTempFolderAction));
        registry
    }

    /// Register an action implementation under its definition's ID
    pub fn register(&mut self, action: Arc<dyn WorkflowAction>) {
        self.actions.insert(action.definition().id, action);
    }

    /// Look up an implementation by action-type ID
    pub fn get(&self, id: &str) -> Option<Arc<dyn WorkflowAction>> {
        self.actions.get(id).cloned()
    }

    /// All registered definitions, for the editor's palette
    pub fn definitions(&self) -> Vec<ActionDefinition> {
        self.actions.values().map(|a| a.definition()).collect()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Read a string input, accepting any JSON scalar and stringifying it
pub(crate) fn string_input(inputs: &HashMap<String, Value>, key: &str) -> Option<String> {
    match inputs.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Read a required string input
pub(crate) fn required_string(
    inputs: &HashMap<String, Value>,
    key: &str,
) -> ActionResult<String> {
    string_input(inputs, key).ok_or_else(|| ActionError::InvalidInput(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_contains_catalog() {
        let registry = ActionRegistry::standard();
        for id in [
            "git-checkout",
            "run-command",
            "confirm",
            "user-input",
            "set-description",
            "add-log",
            "foreach-list",
            "foreach-folder",
            "ask-chatgpt",
            "ask-gemini",
            "split-string",
            "new-temp-folder",
        ] {
            assert!(registry.get(id).is_some(), "missing action: {id}");
        }
        assert!(registry.get("no-such-action").is_none());
    }

    #[test]
    fn test_definitions_match_registry_ids() {
        let registry = ActionRegistry::standard();
        for definition in registry.definitions() {
            let action = registry.get(&definition.id).unwrap();
            assert_eq!(action.definition().id, definition.id);
        }
    }

    #[test]
    fn test_string_input_coercion() {
        let mut inputs = HashMap::new();
        inputs.insert("text".to_string(), serde_json::json!("hello"));
        inputs.insert("num".to_string(), serde_json::json!(5));
        inputs.insert("nil".to_string(), Value::Null);

        assert_eq!(string_input(&inputs, "text").as_deref(), Some("hello"));
        assert_eq!(string_input(&inputs, "num").as_deref(), Some("5"));
        assert_eq!(string_input(&inputs, "nil"), None);
        assert_eq!(string_input(&inputs, "absent"), None);
        assert!(required_string(&inputs, "absent").is_err());
    }
}
