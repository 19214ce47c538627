//! For-each fan-out actions
//!
//! Both variants spawn one child run per item and then wait, as a paused
//! step, for every child to reach a terminal status. The step is re-invoked
//! on every poll cycle, so the two phases are keyed off the persisted pause
//! state: no recorded [`PauseReason::AwaitingChildren`] means phase A (spawn
//! children, pause), a recorded one means phase B (poll children). Child
//! runs live entirely in the persistence gateway as ordinary runs, so the
//! scheduler's poll loop drives them with no special-casing of recursion.

use super::{
    required_string, string_input, ActionDefinition, ActionInputRequest, ActionOutputDefinition,
    ActionParameter, ActionResult, ExecutionContext, ExecutionResult, ParamType, WorkflowAction,
};
use crate::workflow::{PauseReason, RunId, RunStatus, WorkflowRun};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Parse the `additionalInput` value: a JSON object, or a string holding one
fn parse_extra_inputs(value: Option<&Value>) -> HashMap<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        },
        _ => HashMap::new(),
    }
}

/// The pause state this step recorded on a previous invocation, if any
fn recorded_children(context: &ExecutionContext) -> ActionResult<Option<Vec<RunId>>> {
    let run = context.get_run(&context.run_id)?;
    Ok(run.steps.get(&context.step_id).and_then(|s| match &s.pause {
        Some(PauseReason::AwaitingChildren { child_run_ids }) => Some(child_run_ids.clone()),
        _ => None,
    }))
}

/// Phase A: create one child run per item and pause awaiting them
fn spawn_children(
    context: &ExecutionContext,
    child_workflow_id: &str,
    items: Vec<Value>,
    item_variable: &str,
    extra_inputs: HashMap<String, Value>,
) -> ActionResult<ExecutionResult> {
    let child_workflow = context.get_workflow(&child_workflow_id.into())?;

    let mut logs = vec![format!("Spawning {} child workflows...", items.len())];
    let mut child_run_ids = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let mut child_inputs = extra_inputs.clone();
        child_inputs.insert(item_variable.to_string(), item);

        let mut child = WorkflowRun::new(&child_workflow, context.workspace.id.clone())
            .with_input_values(&child_workflow, child_inputs);
        child.description = Some(format!(
            "Child of {} (item {})",
            context.run_id,
            index + 1
        ));

        child_run_ids.push(child.id);
        context.create_run(child)?;
    }

    logs.push(format!(
        "Spawned {} runs. Waiting for completion...",
        child_run_ids.len()
    ));

    let mut outputs = HashMap::new();
    outputs.insert(
        "childRunIds".to_string(),
        json!(child_run_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>()),
    );

    Ok(ExecutionResult::paused_with_outputs(
        PauseReason::AwaitingChildren { child_run_ids },
        outputs,
        logs,
    ))
}

/// Phase B: re-fetch every child's status; stay paused while any is still
/// active, fail if any terminal child failed, succeed otherwise
fn poll_children(
    context: &ExecutionContext,
    child_run_ids: Vec<RunId>,
) -> ActionResult<ExecutionResult> {
    let mut statuses = serde_json::Map::new();
    let mut active = 0usize;
    let mut failed = 0usize;

    for child_id in &child_run_ids {
        match context.get_run(child_id) {
            Ok(child) => {
                statuses.insert(child_id.to_string(), json!(child.status.to_string()));
                match child.status {
                    RunStatus::Failed => failed += 1,
                    RunStatus::Completed | RunStatus::Cancelled => {}
                    RunStatus::Running | RunStatus::Paused => active += 1,
                }
            }
            Err(_) => {
                // A vanished child counts as failed rather than waiting forever
                statuses.insert(child_id.to_string(), json!("missing"));
                failed += 1;
            }
        }
    }

    let total = child_run_ids.len();
    let mut outputs = HashMap::new();
    outputs.insert(
        "childRunIds".to_string(),
        json!(child_run_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>()),
    );
    outputs.insert("childStatuses".to_string(), Value::Object(statuses));

    if active > 0 {
        // Re-persist the status snapshot for observability, no log spam
        return Ok(ExecutionResult::paused_with_outputs(
            PauseReason::AwaitingChildren { child_run_ids },
            outputs,
            Vec::new(),
        ));
    }

    if failed > 0 {
        return Ok(ExecutionResult::failed_with_outputs(
            format!("{failed} child workflows failed."),
            outputs,
            vec![format!("{failed} of {total} children failed.")],
        ));
    }

    outputs.insert("totalProcessed".to_string(), json!(total));
    Ok(ExecutionResult::success(
        outputs,
        vec!["All child workflows completed.".to_string()],
    ))
}

/// Action that iterates over a list, running a child workflow per item
#[derive(Debug, Clone, Copy)]
pub struct ForEachListAction;

#[async_trait::async_trait]
impl WorkflowAction for ForEachListAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "foreach-list".to_string(),
            name: "For Each Item".to_string(),
            description: "Iterate through a list of items and run a child workflow for each."
                .to_string(),
            parameters: vec![
                ActionParameter {
                    name: "items".to_string(),
                    label: "Items List".to_string(),
                    param_type: ParamType::Json,
                    required: true,
                    default_value: None,
                    description: Some("Array of items, or newline-separated text".to_string()),
                },
                ActionParameter {
                    name: "workflowId".to_string(),
                    label: "Run Workflow".to_string(),
                    param_type: ParamType::WorkflowId,
                    required: true,
                    default_value: None,
                    description: None,
                },
                ActionParameter {
                    name: "itemVariableName".to_string(),
                    label: "Item Variable Name".to_string(),
                    param_type: ParamType::String,
                    required: false,
                    default_value: Some(json!("item")),
                    description: Some("Name of the input variable in the child workflow".to_string()),
                },
                ActionParameter {
                    name: "additionalInput".to_string(),
                    label: "Additional Input".to_string(),
                    param_type: ParamType::Json,
                    required: false,
                    default_value: None,
                    description: Some("JSON object passed to every child as inputs".to_string()),
                },
            ],
            inputs: vec![],
            outputs: vec![
                ActionOutputDefinition {
                    name: "totalProcessed".to_string(),
                    output_type: ParamType::Number,
                    description: None,
                },
                ActionOutputDefinition {
                    name: "childRunIds".to_string(),
                    output_type: ParamType::Json,
                    description: None,
                },
            ],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        if let Some(child_run_ids) = recorded_children(context)? {
            return poll_children(context, child_run_ids);
        }

        let items: Vec<Value> = match inputs.get("items") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::String(text)) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| json!(line))
                .collect(),
            _ => {
                return Err(super::ActionError::InvalidInput(
                    "items must be an array or a newline-separated string".to_string(),
                ))
            }
        };

        let workflow_id = required_string(inputs, "workflowId")?;
        let item_variable =
            string_input(inputs, "itemVariableName").unwrap_or_else(|| "item".to_string());
        let extra_inputs = parse_extra_inputs(inputs.get("additionalInput"));

        spawn_children(context, &workflow_id, items, &item_variable, extra_inputs)
    }
}

/// Action that iterates over folders matching a glob pattern, running a
/// child workflow per folder
#[derive(Debug, Clone, Copy)]
pub struct ForEachFolderAction;

#[async_trait::async_trait]
impl WorkflowAction for ForEachFolderAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "foreach-folder".to_string(),
            name: "For Each Folder".to_string(),
            description: "Iterate over folders matching a pattern and run a child workflow"
                .to_string(),
            parameters: vec![
                ActionParameter {
                    name: "pattern".to_string(),
                    label: "Glob Pattern".to_string(),
                    param_type: ParamType::String,
                    required: true,
                    default_value: Some(json!("*")),
                    description: None,
                },
                ActionParameter {
                    name: "childWorkflowId".to_string(),
                    label: "Child Workflow ID".to_string(),
                    param_type: ParamType::WorkflowId,
                    required: true,
                    default_value: None,
                    description: None,
                },
                ActionParameter {
                    name: "itemVariableName".to_string(),
                    label: "Item Variable Name".to_string(),
                    param_type: ParamType::String,
                    required: false,
                    default_value: Some(json!("folder")),
                    description: None,
                },
            ],
            inputs: vec![ActionInputRequest {
                name: "basePath".to_string(),
                input_type: ParamType::String,
                required: true,
                description: None,
            }],
            outputs: vec![ActionOutputDefinition {
                name: "totalProcessed".to_string(),
                output_type: ParamType::Number,
                description: None,
            }],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        if let Some(child_run_ids) = recorded_children(context)? {
            return poll_children(context, child_run_ids);
        }

        let base_path = required_string(inputs, "basePath")?;
        let pattern = string_input(inputs, "pattern").unwrap_or_else(|| "*".to_string());
        let child_workflow_id = required_string(inputs, "childWorkflowId")?;
        let item_variable =
            string_input(inputs, "itemVariableName").unwrap_or_else(|| "folder".to_string());

        let full_pattern = format!("{}/{}", base_path.trim_end_matches('/'), pattern);
        let mut folders: Vec<Value> = glob::glob(&full_pattern)
            .map_err(|e| {
                super::ActionError::InvalidInput(format!("Invalid glob pattern: {}", e))
            })?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_dir())
            .map(|path| json!(path.to_string_lossy().into_owned()))
            .collect();
        folders.sort_by_key(|v| v.as_str().map(str::to_string));

        spawn_children(
            context,
            &child_workflow_id,
            folders,
            &item_variable,
            HashMap::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::actions::ActionOutcome;
    use crate::workflow::test_helpers::*;
    use crate::workflow::{RunPatch, StepExecutionState, StepStatus};

    /// Persist the step state the executor would have written for a result
    fn persist_pause(context: &ExecutionContext, result: &ExecutionResult) {
        let mut state = StepExecutionState::new(context.step_id.clone());
        if let ActionOutcome::Paused { reason, outputs } = &result.outcome {
            state.status = StepStatus::Paused;
            state.pause = Some(reason.clone());
            state.outputs = outputs.clone();
        }
        context
            .update_run(&context.run_id, RunPatch::new().with_step(state))
            .unwrap();
    }

    fn list_inputs(items: Value) -> HashMap<String, Value> {
        let mut inputs = HashMap::new();
        inputs.insert("items".to_string(), items);
        inputs.insert("workflowId".to_string(), json!("wf-child"));
        inputs.insert("itemVariableName".to_string(), json!("item"));
        inputs
    }

    #[tokio::test]
    async fn test_phase_a_spawns_one_run_per_item() {
        let (context, storage) = test_context_with_child_workflow();
        let inputs = list_inputs(json!(["a", "b"]));

        let result = ForEachListAction.execute(&inputs, &context).await.unwrap();
        match &result.outcome {
            ActionOutcome::Paused { reason, outputs } => {
                let PauseReason::AwaitingChildren { child_run_ids } = reason else {
                    panic!("expected AwaitingChildren, got {reason:?}");
                };
                assert_eq!(child_run_ids.len(), 2);
                assert_eq!(outputs["childRunIds"].as_array().unwrap().len(), 2);

                // Each child is a real run seeded with the item variable
                let child = storage.get_run(&child_run_ids[0]).unwrap();
                assert_eq!(child.workflow_id.as_str(), "wf-child");
                assert_eq!(child.input_values["item"], json!("a"));
                assert_eq!(child.status, crate::workflow::RunStatus::Running);
            }
            other => panic!("expected paused, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_newline_separated_items() {
        let (context, storage) = test_context_with_child_workflow();
        let inputs = list_inputs(json!("one\n  two  \n\nthree"));

        let result = ForEachListAction.execute(&inputs, &context).await.unwrap();
        let ActionOutcome::Paused {
            reason: PauseReason::AwaitingChildren { child_run_ids },
            ..
        } = result.outcome
        else {
            panic!("expected paused");
        };
        assert_eq!(child_run_ids.len(), 3);
        let second = storage.get_run(&child_run_ids[1]).unwrap();
        assert_eq!(second.input_values["item"], json!("two"));
    }

    #[tokio::test]
    async fn test_reentrancy_does_not_respawn() {
        let (context, storage) = test_context_with_child_workflow();
        let inputs = list_inputs(json!(["a", "b"]));

        let first = ForEachListAction.execute(&inputs, &context).await.unwrap();
        persist_pause(&context, &first);
        let runs_after_first = storage.list_runs().unwrap().len();

        // Second call with zero completed children: paused again, no new runs
        let second = ForEachListAction.execute(&inputs, &context).await.unwrap();
        assert!(matches!(second.outcome, ActionOutcome::Paused { .. }));
        assert_eq!(storage.list_runs().unwrap().len(), runs_after_first);
    }

    #[tokio::test]
    async fn test_phase_b_success_once_children_complete() {
        let (context, storage) = test_context_with_child_workflow();
        let inputs = list_inputs(json!(["a", "b"]));

        let first = ForEachListAction.execute(&inputs, &context).await.unwrap();
        persist_pause(&context, &first);
        let ActionOutcome::Paused {
            reason: PauseReason::AwaitingChildren { child_run_ids },
            ..
        } = first.outcome
        else {
            panic!("expected paused");
        };

        for id in &child_run_ids {
            storage
                .update_run(
                    id,
                    RunPatch::new().with_status(crate::workflow::RunStatus::Completed),
                )
                .unwrap();
        }

        let third = ForEachListAction.execute(&inputs, &context).await.unwrap();
        match third.outcome {
            ActionOutcome::Success { outputs } => {
                assert_eq!(outputs["totalProcessed"], json!(2));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_phase_b_failed_child_fails_step() {
        let (context, storage) = test_context_with_child_workflow();
        let inputs = list_inputs(json!(["a", "b"]));

        let first = ForEachListAction.execute(&inputs, &context).await.unwrap();
        persist_pause(&context, &first);
        let ActionOutcome::Paused {
            reason: PauseReason::AwaitingChildren { child_run_ids },
            ..
        } = first.outcome
        else {
            panic!("expected paused");
        };

        storage
            .update_run(
                &child_run_ids[0],
                RunPatch::new().with_status(crate::workflow::RunStatus::Failed),
            )
            .unwrap();
        storage
            .update_run(
                &child_run_ids[1],
                RunPatch::new().with_status(crate::workflow::RunStatus::Completed),
            )
            .unwrap();

        let second = ForEachListAction.execute(&inputs, &context).await.unwrap();
        match second.outcome {
            ActionOutcome::Failed { error, .. } => {
                assert!(error.contains("1 child workflows failed"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_foreach_folder_spawns_per_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();
        std::fs::create_dir(dir.path().join("beta")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "not a folder").unwrap();

        let (context, storage) = test_context_with_child_workflow();
        let mut inputs = HashMap::new();
        inputs.insert(
            "basePath".to_string(),
            json!(dir.path().to_string_lossy().into_owned()),
        );
        inputs.insert("pattern".to_string(), json!("*"));
        inputs.insert("childWorkflowId".to_string(), json!("wf-child"));

        let result = ForEachFolderAction.execute(&inputs, &context).await.unwrap();
        let ActionOutcome::Paused {
            reason: PauseReason::AwaitingChildren { child_run_ids },
            ..
        } = result.outcome
        else {
            panic!("expected paused");
        };
        assert_eq!(child_run_ids.len(), 2);

        let first = storage.get_run(&child_run_ids[0]).unwrap();
        assert!(first.input_values["folder"]
            .as_str()
            .unwrap()
            .ends_with("alpha"));
    }

    #[test]
    fn test_parse_extra_inputs_variants() {
        let from_object = parse_extra_inputs(Some(&json!({"k": 1})));
        assert_eq!(from_object["k"], json!(1));

        let from_string = parse_extra_inputs(Some(&json!(r#"{"k": "v"}"#)));
        assert_eq!(from_string["k"], json!("v"));

        assert!(parse_extra_inputs(Some(&json!("not json"))).is_empty());
        assert!(parse_extra_inputs(None).is_empty());
    }
}
