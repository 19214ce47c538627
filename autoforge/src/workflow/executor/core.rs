//! Core run-driving logic
//!
//! One `process_run` invocation is one drive cycle: execute every ready
//! step, re-poll every paused step, then decide whether the run has
//! completed or failed. The driver holds only a transient in-memory copy of
//! the run and re-reads it through the gateway before the final status
//! decision, so a concurrent external mutation (a human resuming a paused
//! step mid-cycle) is observed rather than overwritten.

use super::{ExecutorError, ExecutorResult};
use crate::workflow::actions::{
    ActionOutcome, ActionRegistry, ExecutionContext, ExecutionResult, RunStore,
};
use crate::workflow::{
    graph, resolver, NodeId, RunId, RunStatus, StepExecutionState, StepStatus, Workflow,
    WorkflowNode, WorkflowRun, WorkflowStorage, Workspace,
};
use crate::AutoForgeError;
use std::sync::Arc;
use std::time::Duration;

/// Drives workflow runs forward, one poll cycle at a time
pub struct RunDriver {
    storage: Arc<WorkflowStorage>,
    registry: Arc<ActionRegistry>,
}

impl RunDriver {
    /// Create a new run driver over a storage gateway and action registry
    pub fn new(storage: Arc<WorkflowStorage>, registry: Arc<ActionRegistry>) -> Self {
        Self { storage, registry }
    }

    /// Perform one drive cycle for a run.
    ///
    /// Intended to be invoked repeatedly (poll-driven) for as long as the
    /// run is `Running` or `Paused`; a run in any other status is left
    /// untouched. A missing run is a no-op; a missing workflow or workspace
    /// marks the run `Failed`.
    pub async fn process_run(&self, run_id: &RunId) -> ExecutorResult<()> {
        let run = match self.storage.get_run(run_id) {
            Ok(run) => run,
            Err(AutoForgeError::RunNotFound(_)) => {
                tracing::warn!(%run_id, "Run vanished before processing");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if !run.status.is_active() {
            return Ok(());
        }

        let workflow = match self.storage.get_workflow(&run.workflow_id) {
            Ok(workflow) => workflow,
            Err(AutoForgeError::WorkflowNotFound(_)) => {
                tracing::error!(%run_id, workflow_id = %run.workflow_id, "Workflow missing, failing run");
                self.storage.set_run_status(run_id, RunStatus::Failed)?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let workspace = match self.storage.get_workspace(&run.workspace_id) {
            Ok(workspace) => workspace,
            Err(AutoForgeError::WorkspaceNotFound(_)) => {
                tracing::error!(%run_id, workspace_id = %run.workspace_id, "Workspace missing, failing run");
                self.storage.set_run_status(run_id, RunStatus::Failed)?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if !workspace.working_directory.exists() {
            if let Err(e) = std::fs::create_dir_all(&workspace.working_directory) {
                tracing::error!(
                    dir = %workspace.working_directory.display(),
                    error = %e,
                    "Failed to create workspace directory"
                );
            }
        }

        // Execute every ready step; independent branches run concurrently
        let ready = graph::ready_steps(&run, &workflow);
        let executions = ready.iter().filter_map(|step_id| {
            workflow
                .node(step_id)
                .map(|node| self.execute_step(node, &run, &workflow, &workspace))
        });
        for result in futures::future::join_all(executions).await {
            result?;
        }

        // Re-poll steps that were already paused at the start of this cycle,
        // giving pause/resume and child-run polling their forward progress.
        // A step that paused during this cycle waits for the next one.
        let paused: Vec<NodeId> = run
            .steps_with_status(StepStatus::Paused)
            .into_iter()
            .map(|s| s.step_id.clone())
            .collect();
        for step_id in paused {
            if let Some(node) = workflow.node(&step_id) {
                self.execute_step(node, &run, &workflow, &workspace).await?;
            }
        }

        // Decide completion against fresh state, not this cycle's snapshot
        let fresh = match self.storage.get_run(run_id) {
            Ok(run) => run,
            Err(AutoForgeError::RunNotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let any_running = fresh.any_step(StepStatus::Running);
        let any_paused = fresh.any_step(StepStatus::Paused);
        let any_failed = fresh.any_step(StepStatus::Failed);

        if any_failed && !any_running {
            tracing::info!(%run_id, "Run failed");
            self.storage.set_run_status(run_id, RunStatus::Failed)?;
            return Ok(());
        }

        if !any_running && !any_paused && fresh.status == RunStatus::Running {
            let all_done = workflow.nodes.iter().all(|node| {
                matches!(
                    fresh.step(&node.id).map(|s| s.status),
                    Some(StepStatus::Success) | Some(StepStatus::Skipped)
                )
            });
            if all_done {
                tracing::info!(%run_id, "Run completed");
                self.storage.set_run_status(run_id, RunStatus::Completed)?;
            }
        }

        Ok(())
    }

    /// Execute one step: resolve inputs, mark it running, invoke the action,
    /// and persist the interpreted result
    pub async fn execute_step(
        &self,
        node: &WorkflowNode,
        run: &WorkflowRun,
        workflow: &Workflow,
        workspace: &Workspace,
    ) -> ExecutorResult<()> {
        let inputs = resolver::resolve_inputs(node, run, workspace);
        let prior = run.step(&node.id);

        // Mark running, preserving prior outputs/logs/pause so a re-polled
        // paused step keeps the state its action needs to resume
        let running_state = StepExecutionState {
            step_id: node.id.clone(),
            status: StepStatus::Running,
            input_values: inputs.clone(),
            outputs: prior.map(|s| s.outputs.clone()).unwrap_or_default(),
            logs: prior.map(|s| s.logs.clone()).unwrap_or_default(),
            pause: prior.and_then(|s| s.pause.clone()),
            start_time: Some(
                prior
                    .and_then(|s| s.start_time)
                    .unwrap_or_else(chrono::Utc::now),
            ),
            end_time: None,
            error: None,
        };
        self.storage.update_run_step(&run.id, running_state)?;

        tracing::info!(
            run_id = %run.id,
            workflow = %workflow.name,
            step = %node.id,
            action = %node.action_id,
            "Executing step"
        );

        let context = ExecutionContext::new(
            workspace.clone(),
            workflow.id.clone(),
            run.id,
            node.id.clone(),
            self.storage.clone() as Arc<dyn RunStore>,
        );

        let result = match self.registry.get(&node.action_id) {
            None => ExecutionResult::failed(
                format!("Unknown action: {}", node.action_id),
                vec![format!("Unknown action: {}", node.action_id)],
            ),
            Some(action) => match action.execute(&inputs, &context).await {
                Ok(result) => result,
                // Thrown errors become failed results, never a crashed cycle
                Err(e) => ExecutionResult::failed(
                    e.to_string(),
                    vec![format!("Error executing {}: {}", node.action_id, e)],
                ),
            },
        };

        // Re-read this step's logs: another actor may have appended while
        // the action ran, and logs accumulate rather than overwrite
        let mut logs = self
            .storage
            .get_run(&run.id)
            .ok()
            .and_then(|fresh| fresh.step(&node.id).map(|s| s.logs.clone()))
            .unwrap_or_default();
        logs.extend(result.logs);

        let (status, outputs, pause, error) = match result.outcome {
            ActionOutcome::Success { outputs } => (StepStatus::Success, outputs, None, None),
            ActionOutcome::Failed { error, outputs } => {
                (StepStatus::Failed, outputs, None, Some(error))
            }
            ActionOutcome::Paused { reason, outputs } => {
                (StepStatus::Paused, outputs, Some(reason), None)
            }
        };

        if let Some(error) = &error {
            tracing::warn!(run_id = %run.id, step = %node.id, %error, "Step failed");
        }

        let final_state = StepExecutionState {
            step_id: node.id.clone(),
            status,
            input_values: inputs,
            outputs,
            logs,
            pause,
            start_time: prior
                .and_then(|s| s.start_time)
                .or_else(|| Some(chrono::Utc::now())),
            end_time: Some(chrono::Utc::now()),
            error,
        };
        self.storage.update_run_step(&run.id, final_state)?;

        if status == StepStatus::Paused {
            // Any paused step suspends the whole run
            self.storage.set_run_status(&run.id, RunStatus::Paused)?;
        } else if run.status == RunStatus::Paused {
            // A resolved step wakes a paused run so the next cycle
            // re-evaluates readiness
            self.storage.set_run_status(&run.id, RunStatus::Running)?;
        }

        Ok(())
    }

    /// Drive a run until it reaches a terminal status, polling between
    /// cycles. A run paused on human input stays paused until resolved
    /// externally, so this can wait indefinitely.
    pub async fn drive_until_terminal(
        &self,
        run_id: &RunId,
        poll_interval: Duration,
    ) -> ExecutorResult<WorkflowRun> {
        loop {
            self.process_run(run_id).await?;
            let run = self.storage.get_run(run_id).map_err(ExecutorError::from)?;
            if run.status.is_terminal() {
                return Ok(run);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
