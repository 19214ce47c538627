//! Command-line interface definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// What `list` should enumerate
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum ListKind {
    /// Workflow runs
    #[default]
    Runs,
    /// Workflow definitions
    Workflows,
    /// Workspaces
    Workspaces,
}

#[derive(Parser, Debug)]
#[command(name = "autoforge")]
#[command(version)]
#[command(about = "Execute visually composed automation workflows against workspaces")]
#[command(long_about = "
AutoForge drives workflow runs forward: a long-lived worker polls for active
runs, executes ready steps, re-polls paused ones, and fans out child runs.
Paused steps (confirmations, user input) are resolved with `autoforge resume`.
")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Storage directory (defaults to ~/.autoforge)
    #[arg(long, global = true, value_name = "DIR")]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the long-lived worker loop that drives all active runs
    Worker {
        /// How many distinct runs to drive at once
        #[arg(long, default_value_t = 5)]
        max_concurrent: usize,

        /// Milliseconds between scan cycles
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,
    },

    /// Launch a new run of a workflow
    Run {
        /// Workflow ID to execute
        workflow: String,

        /// Workspace ID to execute against
        #[arg(long)]
        workspace: String,

        /// Run-level input as key=value (repeatable); values parse as JSON
        /// when possible, otherwise as strings
        #[arg(long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Drive the run inline until it reaches a terminal status
        #[arg(long)]
        watch: bool,
    },

    /// Show a run and its per-step status
    Status {
        /// Run ID
        run_id: String,
    },

    /// Resolve a paused step with outputs (the human side of pause/resume)
    Resume {
        /// Run ID
        run_id: String,

        /// Step (node) ID to resolve
        step_id: String,

        /// Step output as key=value (repeatable)
        #[arg(long = "output", value_name = "KEY=VALUE")]
        outputs: Vec<String>,
    },

    /// Cancel a run, removing it from future scheduling
    Cancel {
        /// Run ID
        run_id: String,
    },

    /// List runs, workflows or workspaces
    List {
        /// What to list
        #[arg(value_enum, default_value_t = ListKind::Runs)]
        kind: ListKind,
    },
}

impl Cli {
    /// Parse from the process arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_defaults() {
        let cli = Cli::try_parse_from(["autoforge", "worker"]).unwrap();
        match cli.command {
            Commands::Worker {
                max_concurrent,
                poll_interval_ms,
            } => {
                assert_eq!(max_concurrent, 5);
                assert_eq!(poll_interval_ms, 1000);
            }
            other => panic!("expected worker, got {other:?}"),
        }
    }

    #[test]
    fn test_run_with_inputs() {
        let cli = Cli::try_parse_from([
            "autoforge",
            "run",
            "wf-1",
            "--workspace",
            "ws-1",
            "--input",
            "branch=main",
            "--input",
            "count=3",
            "--watch",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                workflow,
                workspace,
                inputs,
                watch,
            } => {
                assert_eq!(workflow, "wf-1");
                assert_eq!(workspace, "ws-1");
                assert_eq!(inputs, vec!["branch=main", "count=3"]);
                assert!(watch);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_subcommand_rejected() {
        let error = Cli::try_parse_from(["autoforge", "frobnicate"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }
}
