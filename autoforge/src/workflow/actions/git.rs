//! Git checkout action
//!
//! Clones a repository into the workspace (shallow) or fast-forwards an
//! existing clone. Git is always invoked with an argv vector, never through
//! a shell, so templated URLs and branch names cannot inject commands.

use super::{
    required_string, string_input, ActionDefinition, ActionError, ActionOutputDefinition,
    ActionParameter, ActionResult, ExecutionContext, ExecutionResult, ParamType, WorkflowAction,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Locate the git binary
fn git_binary() -> PathBuf {
    which::which("git").unwrap_or_else(|_| PathBuf::from("git"))
}

/// Run one git command, capturing output
async fn run_git(args: &[&str], cwd: Option<&Path>) -> ActionResult<std::process::Output> {
    let mut cmd = Command::new(git_binary());
    cmd.args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.output()
        .await
        .map_err(|e| ActionError::ExecutionError(format!("Failed to run git: {}", e)))
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Check whether a directory is a git repository
async fn is_git_repository(path: &Path) -> bool {
    matches!(
        run_git(&["rev-parse", "--git-dir"], Some(path)).await,
        Ok(output) if output.status.success()
    )
}

/// Action that checks out a git repository into the workspace
#[derive(Debug, Clone, Copy)]
pub struct GitCheckoutAction;

impl GitCheckoutAction {
    async fn clone_shallow(
        &self,
        repo_url: &str,
        branch: &str,
        target: &Path,
        logs: &mut Vec<String>,
    ) -> ActionResult<()> {
        logs.push(format!("Cloning {} (branch {})...", repo_url, branch));
        let target_str = target.to_string_lossy();
        let output = run_git(
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                branch,
                repo_url,
                &target_str,
            ],
            None,
        )
        .await?;

        if !output.status.success() {
            return Err(ActionError::ExecutionError(format!(
                "git clone failed: {}",
                stderr_of(&output)
            )));
        }
        logs.push(format!("Checked out branch: {}", branch));
        Ok(())
    }

    async fn fast_forward(
        &self,
        branch: &str,
        target: &Path,
        logs: &mut Vec<String>,
    ) -> ActionResult<()> {
        logs.push(format!(
            "Existing clone at {}, fast-forwarding {}...",
            target.display(),
            branch
        ));

        let fetch = run_git(&["fetch", "--depth", "1", "origin", branch], Some(target)).await?;
        if !fetch.status.success() {
            return Err(ActionError::ExecutionError(format!(
                "git fetch failed: {}",
                stderr_of(&fetch)
            )));
        }

        let checkout = run_git(&["checkout", branch], Some(target)).await?;
        if !checkout.status.success() {
            return Err(ActionError::ExecutionError(format!(
                "git checkout failed: {}",
                stderr_of(&checkout)
            )));
        }

        let pull = run_git(&["pull", "--ff-only", "origin", branch], Some(target)).await?;
        if !pull.status.success() {
            return Err(ActionError::ExecutionError(format!(
                "git pull --ff-only failed: {}",
                stderr_of(&pull)
            )));
        }

        logs.push(format!("Fast-forwarded branch: {}", branch));
        Ok(())
    }
}

#[async_trait::async_trait]
impl WorkflowAction for GitCheckoutAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            id: "git-checkout".to_string(),
            name: "Checkout Git Repository".to_string(),
            description: "Clone a git repository into the working directory".to_string(),
            parameters: vec![
                ActionParameter {
                    name: "repoUrl".to_string(),
                    label: "Repository URL".to_string(),
                    param_type: ParamType::String,
                    required: true,
                    default_value: None,
                    description: None,
                },
                ActionParameter {
                    name: "branch".to_string(),
                    label: "Branch".to_string(),
                    param_type: ParamType::String,
                    required: false,
                    default_value: Some(json!("main")),
                    description: None,
                },
            ],
            inputs: vec![],
            outputs: vec![ActionOutputDefinition {
                name: "repoPath".to_string(),
                output_type: ParamType::String,
                description: Some("Absolute path to the checked out repo".to_string()),
            }],
        }
    }

    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
        context: &ExecutionContext,
    ) -> ActionResult<ExecutionResult> {
        let repo_url = required_string(inputs, "repoUrl")?;
        let branch = string_input(inputs, "branch").unwrap_or_else(|| "main".to_string());
        let target = context.workspace.working_directory.join("repo");

        let mut logs = Vec::new();

        if target.exists() {
            if !is_git_repository(&target).await {
                // Never clobber a directory we did not create
                return Ok(ExecutionResult::failed(
                    format!(
                        "Path {} exists but is not a git repository",
                        target.display()
                    ),
                    logs,
                ));
            }
            self.fast_forward(&branch, &target, &mut logs).await?;
        } else {
            self.clone_shallow(&repo_url, &branch, &target, &mut logs)
                .await?;
        }

        let mut outputs = HashMap::new();
        outputs.insert(
            "repoPath".to_string(),
            json!(target.to_string_lossy().into_owned()),
        );
        Ok(ExecutionResult::success(outputs, logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::actions::ActionOutcome;
    use crate::workflow::test_helpers::*;

    #[tokio::test]
    async fn test_fails_closed_on_non_repository_path() {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("repo");
        std::fs::create_dir_all(&repo_dir).unwrap();
        std::fs::write(repo_dir.join("unrelated.txt"), "data").unwrap();

        let (context, _storage) = test_context_in(dir.path());
        let mut inputs = HashMap::new();
        inputs.insert("repoUrl".to_string(), json!("https://example.com/x.git"));

        let result = GitCheckoutAction.execute(&inputs, &context).await.unwrap();
        match result.outcome {
            ActionOutcome::Failed { error, .. } => {
                assert!(error.contains("not a git repository"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // The existing directory must be untouched
        assert!(repo_dir.join("unrelated.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_repo_url_is_invalid_input() {
        let (context, _storage) = test_context();
        let inputs = HashMap::new();
        assert!(GitCheckoutAction.execute(&inputs, &context).await.is_err());
    }
}
