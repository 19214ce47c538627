//! Human-in-the-loop control actions
//!
//! `confirm` and `user-input` never succeed inline: they pause the step and
//! wait for an external actor (the UI, or `autoforge resume`) to mark the
//! step successful through the persistence layer. The run driver's re-poll
//! of paused steps observes that change on its next cycle.

use super::{
    ActionDefinition, ActionInputRequest, ActionOutputDefinition, ActionParameter, ActionResult,
    ExecutionContext, ExecutionResult, ParamType, WorkflowAction,
};
use crate::workflow::PauseReason;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Action that pauses the run until a human confirms
#[derive(Debug, Clone, Copy)]
pub struct ConfirmAction;

#[async_trait::async_trait]
impl WorkflowAction for ConfirmAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "confirm".to_string(),
            name: "Confirmation".to_string(),
            description: "Pause the workflow and ask for user confirmation".to_string(),
            parameters: vec![ActionParameter {
                name: "message".to_string(),
                label: "Message".to_string(),
                param_type: ParamType::String,
                required: true,
                default_value: None,
                description: None,
            }],
            inputs: vec![],
            outputs: vec![ActionOutputDefinition {
                name: "confirmed".to_string(),
                output_type: ParamType::Boolean,
                description: None,
            }],
        }
    }

    async fn execute(
        &self,
        _inputs: &HashMap<String, Value>,
        _context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        Ok(ExecutionResult::paused(
            PauseReason::AwaitingConfirmation,
            vec!["Waiting for user confirmation...".to_string()],
        ))
    }
}

/// Action that pauses the run until a human supplies a value
#[derive(Debug, Clone, Copy)]
pub struct UserInputAction;

#[async_trait::async_trait]
impl WorkflowAction for UserInputAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "user-input".to_string(),
            name: "User Input".to_string(),
            description: "Request input from the user".to_string(),
            parameters: vec![
                ActionParameter {
                    name: "prompt".to_string(),
                    label: "Prompt Message".to_string(),
                    param_type: ParamType::String,
                    required: true,
                    default_value: None,
                    description: None,
                },
                ActionParameter {
                    name: "fieldName".to_string(),
                    label: "Field Name".to_string(),
                    param_type: ParamType::String,
                    required: false,
                    default_value: Some(json!("userInput")),
                    description: None,
                },
            ],
            inputs: vec![ActionInputRequest {
                name: "contextData".to_string(),
                input_type: ParamType::String,
                required: false,
                description: Some("Optional context to show the user".to_string()),
            }],
            outputs: vec![ActionOutputDefinition {
                name: "value".to_string(),
                output_type: ParamType::String,
                description: None,
            }],
        }
    }

    async fn execute(
        &self,
        _inputs: &HashMap<String, Value>,
        _context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        Ok(ExecutionResult::paused(
            PauseReason::AwaitingInput,
            vec!["Waiting for user input...".to_string()],
        ))
    }
}
