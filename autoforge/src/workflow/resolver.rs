//! Input resolution for workflow steps
//!
//! Turns a node's declared input mappings plus the run's accumulated state
//! into the concrete input value map for one step. Resolution never fails:
//! unresolved references yield null/empty values and it is up to the action
//! implementation to validate required inputs.

use crate::workflow::{ContextSource, InputMapping, WorkflowNode, WorkflowRun, Workspace};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Matches a string that is exactly one `{{ path }}` token, so the typed
/// underlying value can be passed through without stringification
static SINGLE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*([a-zA-Z0-9_\-.]+)\s*\}\}$").unwrap());

/// Matches every `{{ path }}` token for string interpolation
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_\-.]+)\s*\}\}").unwrap());

/// Resolve the concrete input values for one step.
///
/// `constant` string values pass through [`substitute_variables`]; other
/// constants are used verbatim. `context` mappings read workspace fields.
/// `variable` mappings look up `"<stepId>.<outputKey>"` in that step's
/// recorded outputs directly, with no templating layer.
pub fn resolve_inputs(
    node: &WorkflowNode,
    run: &WorkflowRun,
    workspace: &Workspace,
) -> HashMap<String, Value> {
    let mut inputs = HashMap::new();

    for (key, mapping) in &node.input_mappings {
        match mapping {
            InputMapping::Constant(value) => {
                let resolved = match value {
                    Value::String(text) => substitute_variables(text, run, workspace),
                    other => other.clone(),
                };
                inputs.insert(key.clone(), resolved);
            }
            InputMapping::Context(source) => {
                let value = match source {
                    ContextSource::WorkingDir => {
                        Value::String(workspace.working_directory.to_string_lossy().into_owned())
                    }
                    ContextSource::WorkspaceId => Value::String(workspace.id.to_string()),
                };
                inputs.insert(key.clone(), value);
            }
            InputMapping::Variable(reference) => {
                if let Some((step_id, output_key)) = reference.split_once('.') {
                    if let Some(state) = run.steps.get(&step_id.into()) {
                        if let Some(value) = state.outputs.get(output_key) {
                            inputs.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
    }

    inputs
}

/// Substitute `{{ path }}` tokens in a template string.
///
/// A string that is exactly one token resolves to the typed underlying value
/// (a number stays a number); any other string undergoes token-by-token
/// replacement with the stringified value, unresolved tokens becoming the
/// empty string.
pub fn substitute_variables(text: &str, run: &WorkflowRun, workspace: &Workspace) -> Value {
    if let Some(captures) = SINGLE_TOKEN.captures(text) {
        return resolve_path(&captures[1], run, workspace).unwrap_or(Value::Null);
    }

    let replaced = TOKEN.replace_all(text, |captures: &regex::Captures<'_>| {
        match resolve_path(&captures[1], run, workspace) {
            Some(value) => stringify(&value),
            None => String::new(),
        }
    });

    Value::String(replaced.into_owned())
}

/// Resolve a dotted template path against the run and workspace.
///
/// Grammar: `input.<name>` reads a run-level input value;
/// `workspace.id` / `workspace.workingDirectory` read workspace fields;
/// `<stepId>.outputs.<key>` or the shorthand `<stepId>.<key>` read a step's
/// recorded output.
fn resolve_path(path: &str, run: &WorkflowRun, workspace: &Workspace) -> Option<Value> {
    let parts: Vec<&str> = path.split('.').collect();
    let root = *parts.first()?;

    if root == "input" {
        return run.input_values.get(*parts.get(1)?).cloned();
    }

    if root == "workspace" {
        return match parts.get(1) {
            Some(&"id") => Some(Value::String(workspace.id.to_string())),
            Some(&"workingDirectory") => Some(Value::String(
                workspace.working_directory.to_string_lossy().into_owned(),
            )),
            _ => None,
        };
    }

    let state = run.steps.get(&root.into())?;
    match (parts.get(1), parts.get(2)) {
        (Some(&"outputs"), Some(key)) => state.outputs.get(*key).cloned(),
        (Some(key), _) => state.outputs.get(*key).cloned(),
        _ => None,
    }
}

/// Render a JSON value the way it should appear inside an interpolated
/// string: strings bare, everything else in JSON notation
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_helpers::*;
    use crate::workflow::{StepExecutionState, StepStatus, Workflow};
    use serde_json::json;

    fn run_with_step_output(
        workflow: &Workflow,
        step: &str,
        key: &str,
        value: Value,
    ) -> WorkflowRun {
        let mut run = WorkflowRun::new(workflow, "ws-1".into());
        let mut state = StepExecutionState::new(step.into());
        state.status = StepStatus::Success;
        state.outputs.insert(key.to_string(), value);
        run.steps.insert(step.into(), state);
        run
    }

    #[test]
    fn test_single_token_preserves_type() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run = run_with_step_output(&workflow, "step-1", "exitCode", json!(0));

        let value = substitute_variables("{{ step-1.exitCode }}", &run, &workspace);
        assert_eq!(value, json!(0));
    }

    #[test]
    fn test_workspace_directory_round_trip() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run = WorkflowRun::new(&workflow, "ws-1".into());

        // Sole token: typed (the exact string), not re-wrapped
        let value = substitute_variables("{{ workspace.workingDirectory }}", &run, &workspace);
        assert_eq!(value, json!("/tmp/work"));

        // Embedded: stringified into the surrounding text
        let value = substitute_variables("dir={{ workspace.workingDirectory }}!", &run, &workspace);
        assert_eq!(value, json!("dir=/tmp/work!"));
    }

    #[test]
    fn test_embedded_tokens_stringify() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run = run_with_step_output(&workflow, "step-1", "count", json!(42));

        let value = substitute_variables("found {{ step-1.count }} items", &run, &workspace);
        assert_eq!(value, json!("found 42 items"));
    }

    #[test]
    fn test_unresolved_tokens_never_fail() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run = WorkflowRun::new(&workflow, "ws-1".into());

        assert_eq!(
            substitute_variables("{{ ghost.value }}", &run, &workspace),
            Value::Null
        );
        assert_eq!(
            substitute_variables("x={{ ghost.value }}y", &run, &workspace),
            json!("x=y")
        );
    }

    #[test]
    fn test_run_input_path() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let mut run = WorkflowRun::new(&workflow, "ws-1".into());
        run.input_values
            .insert("repoUrl".to_string(), json!("https://x/y.git"));

        let value = substitute_variables("{{ input.repoUrl }}", &run, &workspace);
        assert_eq!(value, json!("https://x/y.git"));
    }

    #[test]
    fn test_step_output_shorthand_and_long_form() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run = run_with_step_output(&workflow, "step-1", "stdout", json!("hello"));

        assert_eq!(
            substitute_variables("{{ step-1.outputs.stdout }}", &run, &workspace),
            json!("hello")
        );
        assert_eq!(
            substitute_variables("{{ step-1.stdout }}", &run, &workspace),
            json!("hello")
        );
    }

    #[test]
    fn test_resolve_constant_with_template() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let mut run = WorkflowRun::new(&workflow, "ws-1".into());
        run.input_values.insert("name".to_string(), json!("demo"));

        let mut node = create_node("n", "run-command");
        node.input_mappings.insert(
            "command".to_string(),
            InputMapping::Constant(json!("echo {{ input.name }}")),
        );
        node.input_mappings
            .insert("retries".to_string(), InputMapping::Constant(json!(2)));

        let inputs = resolve_inputs(&node, &run, &workspace);
        assert_eq!(inputs["command"], json!("echo demo"));
        assert_eq!(inputs["retries"], json!(2));
    }

    #[test]
    fn test_resolve_context_mapping() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run = WorkflowRun::new(&workflow, "ws-1".into());

        let mut node = create_node("n", "run-command");
        node.input_mappings.insert(
            "workingDir".to_string(),
            InputMapping::Context(ContextSource::WorkingDir),
        );
        node.input_mappings.insert(
            "ws".to_string(),
            InputMapping::Context(ContextSource::WorkspaceId),
        );

        let inputs = resolve_inputs(&node, &run, &workspace);
        assert_eq!(inputs["workingDir"], json!("/tmp/work"));
        assert_eq!(inputs["ws"], json!("ws-1"));
    }

    #[test]
    fn test_resolve_variable_mapping() {
        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run = run_with_step_output(&workflow, "step-1", "value", json!("picked"));

        let mut node = create_node("n", "run-command");
        node.input_mappings.insert(
            "choice".to_string(),
            InputMapping::Variable("step-1.value".to_string()),
        );
        // Unresolvable references are simply absent, never an error
        node.input_mappings.insert(
            "missing".to_string(),
            InputMapping::Variable("ghost.value".to_string()),
        );

        let inputs = resolve_inputs(&node, &run, &workspace);
        assert_eq!(inputs["choice"], json!("picked"));
        assert!(!inputs.contains_key("missing"));
    }
}
