//! Small data-shaping actions

use super::{
    string_input, ActionDefinition, ActionError, ActionInputRequest, ActionOutputDefinition,
    ActionParameter, ActionResult, ExecutionContext, ExecutionResult, ParamType, WorkflowAction,
};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Action that splits a string by a delimiter into a list
#[derive(Debug, Clone, Copy)]
pub struct SplitStringAction;

#[async_trait::async_trait]
impl WorkflowAction for SplitStringAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "split-string".to_string(),
            name: "Split String".to_string(),
            description: "Split a string by a delimiter into a list of strings".to_string(),
            parameters: vec![ActionParameter {
                name: "delimiter".to_string(),
                label: "Delimiter".to_string(),
                param_type: ParamType::String,
                required: true,
                default_value: Some(json!(",")),
                description: None,
            }],
            inputs: vec![ActionInputRequest {
                name: "inputString".to_string(),
                input_type: ParamType::String,
                required: true,
                description: None,
            }],
            outputs: vec![ActionOutputDefinition {
                name: "strings".to_string(),
                output_type: ParamType::Json,
                description: None,
            }],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        _context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let delimiter = string_input(inputs, "delimiter").unwrap_or_else(|| ",".to_string());
        let input_string = string_input(inputs, "inputString").unwrap_or_default();

        let parts: Vec<&str> = input_string
            .split(&delimiter)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        let logs = vec![format!(
            "Split string of length {} with delimiter \"{}\" into {} parts",
            input_string.len(),
            delimiter,
            parts.len()
        )];

        let mut outputs = HashMap::new();
        outputs.insert("strings".to_string(), json!(parts));
        Ok(ExecutionResult::success(outputs, logs))
    }
}

/// Action that creates a fresh folder under the system temp directory
#[derive(Debug, Clone, Copy)]
pub struct NewTempFolderAction;

#[async_trait::async_trait]
impl WorkflowAction for NewTempFolderAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "new-temp-folder".to_string(),
            name: "New Temp Folder".to_string(),
            description: "Create a new temporary folder".to_string(),
            parameters: vec![],
            inputs: vec![],
            outputs: vec![ActionOutputDefinition {
                name: "path".to_string(),
                output_type: ParamType::String,
                description: Some("Absolute path to the new temp folder".to_string()),
            }],
        }
    }

    async fn execute(
        &self,
        _inputs: &HashMap<String, Value>,
        _context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let path = std::env::temp_dir().join(format!(
            "autoforge-{}",
            ulid::Ulid::new().to_string().to_lowercase()
        ));
        std::fs::create_dir_all(&path).map_err(ActionError::IoError)?;

        let mut outputs = HashMap::new();
        outputs.insert(
            "path".to_string(),
            json!(path.to_string_lossy().into_owned()),
        );
        Ok(ExecutionResult::success(
            outputs,
            vec![format!("Created temp folder {}", path.display())],
        ))
    }
}
