//! Run-record side-effect actions
//!
//! `set-description` and `add-log` mutate the parent run's user-facing
//! fields through the context's narrow persistence capabilities and produce
//! no outputs.

use super::{
    string_input, ActionDefinition, ActionParameter, ActionResult, ExecutionContext,
    ExecutionResult, ParamType, WorkflowAction,
};
use crate::workflow::{RunPatch, UserLogEntry};
use serde_json::Value;
use std::collections::HashMap;

/// Action that replaces the run's human-readable description
#[derive(Debug, Clone, Copy)]
pub struct SetDescriptionAction;

#[async_trait::async_trait]
impl WorkflowAction for SetDescriptionAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "set-description".to_string(),
            name: "Set Run Description".to_string(),
            description: "Update the description of the current run (Markdown supported)"
                .to_string(),
            parameters: vec![ActionParameter {
                name: "description".to_string(),
                label: "Description Text".to_string(),
                param_type: ParamType::Text,
                required: true,
                default_value: None,
                description: Some("Markdown allowed".to_string()),
            }],
            inputs: vec![],
            outputs: vec![],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let description = string_input(inputs, "description").unwrap_or_default();
        let mut logs = vec![format!("Setting run description to: {}", description)];

        context.update_run(
            &context.run_id,
            RunPatch::new().with_description(description),
        )?;
        logs.push("Run description updated.".to_string());

        Ok(ExecutionResult::success(HashMap::new(), logs))
    }
}

/// Action that appends a markdown entry to the run's user log
#[derive(Debug, Clone, Copy)]
pub struct AddLogAction;

#[async_trait::async_trait]
impl WorkflowAction for AddLogAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "add-log".to_string(),
            name: "Add Log Entry".to_string(),
            description: "Append a markdown log entry to the run view".to_string(),
            parameters: vec![ActionParameter {
                name: "content".to_string(),
                label: "Log Content".to_string(),
                param_type: ParamType::Text,
                required: true,
                default_value: None,
                description: Some("Markdown allowed".to_string()),
            }],
            inputs: vec![],
            outputs: vec![],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let content = string_input(inputs, "content").unwrap_or_default();

        // Append to the freshest log list; the gateway replaces it whole
        let run = context.get_run(&context.run_id)?;
        let mut user_logs = run.user_logs;
        user_logs.push(UserLogEntry {
            timestamp: chrono::Utc::now(),
            content,
            step_id: Some(context.step_id.clone()),
        });
        context.update_run(&context.run_id, RunPatch::new().with_user_logs(user_logs))?;

        Ok(ExecutionResult::success(
            HashMap::new(),
            vec!["User log added.".to_string()],
        ))
    }
}
