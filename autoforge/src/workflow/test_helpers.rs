//! Shared test fixtures for workflow tests

use crate::workflow::actions::{ExecutionContext, RunStore};
use crate::workflow::{
    InputMapping, Workflow, WorkflowId, WorkflowNode, WorkflowRun, WorkflowStorage, Workspace,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Create a node with no input mappings
pub fn create_node(id: &str, action_id: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.into(),
        label: id.to_string(),
        action_id: action_id.to_string(),
        input_mappings: HashMap::new(),
    }
}

/// Create a run-command node that echoes the given text
pub fn echo_node(id: &str, text: &str) -> WorkflowNode {
    let mut node = create_node(id, "run-command");
    node.input_mappings.insert(
        "command".to_string(),
        InputMapping::Constant(json!(format!("echo {text}"))),
    );
    node
}

/// Two run-command steps in sequence: step-1 -> step-2
pub fn create_linear_workflow() -> Workflow {
    let mut workflow = Workflow::new(WorkflowId::new("wf-1"), "Linear");
    workflow.add_node(create_node("step-1", "run-command"));
    workflow.add_node(create_node("step-2", "run-command"));
    workflow.add_edge("step-1".into(), "step-2".into());
    workflow
}

/// A workspace pointing at the given directory
pub fn create_workspace(dir: impl AsRef<Path>) -> Workspace {
    Workspace::new("ws-1".into(), "Test Workspace", dir.as_ref())
}

/// Memory-backed execution context for a stored run of the linear workflow,
/// with `step-1` as the current step
pub fn test_context_in(dir: impl AsRef<Path>) -> (ExecutionContext, Arc<WorkflowStorage>) {
    let storage = Arc::new(WorkflowStorage::memory());
    let workflow = create_linear_workflow();
    let workspace = create_workspace(dir);

    storage.store_workflow(workflow.clone()).unwrap();
    storage.store_workspace(workspace.clone()).unwrap();

    let run = WorkflowRun::new(&workflow, workspace.id.clone());
    let run_id = run.id;
    storage.create_run(run).unwrap();

    let context = ExecutionContext::new(
        workspace,
        workflow.id,
        run_id,
        "step-1".into(),
        storage.clone() as Arc<dyn RunStore>,
    );
    (context, storage)
}

/// Like [`test_context_in`] with the system temp dir as working directory
pub fn test_context() -> (ExecutionContext, Arc<WorkflowStorage>) {
    test_context_in(std::env::temp_dir())
}

/// [`test_context`] plus a stored single-step child workflow `wf-child`
/// for fan-out tests
pub fn test_context_with_child_workflow() -> (ExecutionContext, Arc<WorkflowStorage>) {
    let (context, storage) = test_context();

    let mut child = Workflow::new(WorkflowId::new("wf-child"), "Child");
    child.add_node(echo_node("child-step", "working"));
    storage.store_workflow(child).unwrap();

    (context, storage)
}
