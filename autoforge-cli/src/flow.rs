//! Implementations of the run-facing subcommands

use crate::cli::ListKind;
use anyhow::{bail, Context};
use autoforge::workflow::{
    ActionRegistry, NodeId, RunDriver, RunId, RunScheduler, RunStatus, SchedulerConfig,
    StepStatus, WorkflowRun, WorkflowStorage,
};
use colored::Colorize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Parse repeated `key=value` arguments; values parse as JSON when they can,
/// otherwise stay strings
fn parse_key_values(pairs: &[String]) -> anyhow::Result<HashMap<String, Value>> {
    let mut map = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid argument '{pair}'. Use key=value format"))?;
        let parsed = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        map.insert(key.to_string(), parsed);
    }
    Ok(map)
}

fn parse_run_id(raw: &str) -> anyhow::Result<RunId> {
    RunId::parse(raw).map_err(|e| anyhow::anyhow!(e))
}

fn colorize_run_status(status: RunStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        RunStatus::Running => text.cyan(),
        RunStatus::Paused => text.yellow(),
        RunStatus::Completed => text.green(),
        RunStatus::Failed => text.red(),
        RunStatus::Cancelled => text.dimmed(),
    }
}

fn colorize_step_status(status: StepStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        StepStatus::Pending => text.dimmed(),
        StepStatus::Running => text.cyan(),
        StepStatus::Success => text.green(),
        StepStatus::Failed => text.red(),
        StepStatus::Paused => text.yellow(),
        StepStatus::Skipped => text.dimmed(),
    }
}

/// `autoforge worker`
pub async fn run_worker(
    storage: Arc<WorkflowStorage>,
    max_concurrent: usize,
    poll_interval_ms: u64,
) -> anyhow::Result<()> {
    let scheduler = RunScheduler::new(
        storage,
        Arc::new(ActionRegistry::standard()),
        SchedulerConfig {
            max_concurrent_runs: max_concurrent,
            poll_interval: Duration::from_millis(poll_interval_ms),
        },
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received interrupt, shutting down");
                shutdown.cancel();
            }
        });
    }

    scheduler.run(shutdown).await;
    Ok(())
}

/// `autoforge run`
pub async fn launch_run(
    storage: Arc<WorkflowStorage>,
    workflow_id: &str,
    workspace_id: &str,
    inputs: &[String],
    watch: bool,
) -> anyhow::Result<()> {
    let workflow = storage
        .get_workflow(&workflow_id.into())
        .context("Unknown workflow")?;
    let workspace = storage
        .get_workspace(&workspace_id.into())
        .context("Unknown workspace")?;

    if let Err(errors) = workflow.validate_structure() {
        bail!("Workflow failed validation:\n  {}", errors.join("\n  "));
    }

    let input_values = parse_key_values(inputs)?;
    let run = WorkflowRun::new(&workflow, workspace.id.clone())
        .with_input_values(&workflow, input_values);
    let run_id = run.id;
    storage.create_run(run)?;

    println!("Started run {run_id} of workflow '{}'", workflow.name);

    if watch {
        let driver = RunDriver::new(storage.clone(), Arc::new(ActionRegistry::standard()));
        let run = driver
            .drive_until_terminal(&run_id, Duration::from_millis(500))
            .await?;
        println!("Run finished: {}", colorize_run_status(run.status));
        print_run(&run);
        if run.status != RunStatus::Completed {
            std::process::exit(1);
        }
    } else {
        println!("A running worker will pick it up; watch it with: autoforge status {run_id}");
    }

    Ok(())
}

fn print_run(run: &WorkflowRun) {
    println!(
        "{} {}  workflow={}  workspace={}",
        "run".bold(),
        run.id,
        run.workflow_id,
        run.workspace_id
    );
    println!(
        "status: {}  started: {}",
        colorize_run_status(run.status),
        run.start_time.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(description) = &run.description {
        println!("description: {description}");
    }

    if run.steps.is_empty() {
        println!("(no steps executed yet)");
        return;
    }

    let mut steps: Vec<_> = run.steps.values().collect();
    steps.sort_by_key(|s| s.start_time);
    println!("steps:");
    for step in steps {
        let mut line = format!(
            "  {:<24} {}",
            step.step_id.to_string(),
            colorize_step_status(step.status)
        );
        if let Some(error) = &step.error {
            line.push_str(&format!("  {}", error.red()));
        }
        println!("{line}");
    }

    if !run.user_logs.is_empty() {
        println!("log:");
        for entry in &run.user_logs {
            println!(
                "  [{}] {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.content
            );
        }
    }
}

/// `autoforge status`
pub fn show_status(storage: Arc<WorkflowStorage>, run_id: &str) -> anyhow::Result<()> {
    let run = storage.get_run(&parse_run_id(run_id)?)?;
    print_run(&run);
    Ok(())
}

/// `autoforge resume`
pub fn resume_step(
    storage: Arc<WorkflowStorage>,
    run_id: &str,
    step_id: &str,
    outputs: &[String],
) -> anyhow::Result<()> {
    let run_id = parse_run_id(run_id)?;
    let outputs = parse_key_values(outputs)?;
    storage.resume_step(&run_id, &NodeId::from(step_id), outputs)?;
    println!("Resumed step '{step_id}' of run {run_id}");
    Ok(())
}

/// `autoforge cancel`
pub fn cancel_run(storage: Arc<WorkflowStorage>, run_id: &str) -> anyhow::Result<()> {
    let run_id = parse_run_id(run_id)?;
    storage.cancel_run(&run_id)?;
    println!("Cancelled run {run_id}");
    Ok(())
}

/// `autoforge list`
pub fn list(storage: Arc<WorkflowStorage>, kind: ListKind) -> anyhow::Result<()> {
    match kind {
        ListKind::Runs => {
            let mut runs = storage.list_runs()?;
            runs.sort_by_key(|r| r.start_time);
            for run in runs {
                println!(
                    "{}  {:<10} workflow={}  started={}",
                    run.id,
                    colorize_run_status(run.status),
                    run.workflow_id,
                    run.start_time.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        ListKind::Workflows => {
            for workflow in storage.list_workflows()? {
                println!(
                    "{:<24} {}  ({} nodes, {} edges)",
                    workflow.id.to_string(),
                    workflow.name,
                    workflow.nodes.len(),
                    workflow.edges.len()
                );
            }
        }
        ListKind::Workspaces => {
            for workspace in storage.list_workspaces()? {
                println!(
                    "{:<24} {}  {}",
                    workspace.id.to_string(),
                    workspace.name,
                    workspace.working_directory.display()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values_json_and_strings() {
        let parsed = parse_key_values(&[
            "name=demo".to_string(),
            "count=3".to_string(),
            "flag=true".to_string(),
            "url=https://x/y.git".to_string(),
        ])
        .unwrap();

        assert_eq!(parsed["name"], Value::String("demo".to_string()));
        assert_eq!(parsed["count"], serde_json::json!(3));
        assert_eq!(parsed["flag"], serde_json::json!(true));
        assert_eq!(parsed["url"], Value::String("https://x/y.git".to_string()));
    }

    #[test]
    fn test_parse_key_values_rejects_bare_words() {
        assert!(parse_key_values(&["nonsense".to_string()]).is_err());
    }
}
