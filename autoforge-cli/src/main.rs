mod cli;
mod flow;

use autoforge::workflow::WorkflowStorage;
use cli::{Cli, Commands};
use is_terminal::IsTerminal;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let storage = Arc::new(match &cli.storage {
        Some(dir) => WorkflowStorage::file_system_at(dir)?,
        None => WorkflowStorage::file_system()?,
    });

    match cli.command {
        Commands::Worker {
            max_concurrent,
            poll_interval_ms,
        } => flow::run_worker(storage, max_concurrent, poll_interval_ms).await,
        Commands::Run {
            workflow,
            workspace,
            inputs,
            watch,
        } => flow::launch_run(storage, &workflow, &workspace, &inputs, watch).await,
        Commands::Status { run_id } => flow::show_status(storage, &run_id),
        Commands::Resume {
            run_id,
            step_id,
            outputs,
        } => flow::resume_step(storage, &run_id, &step_id, &outputs),
        Commands::Cancel { run_id } => flow::cancel_run(storage, &run_id),
        Commands::List { kind } => flow::list(storage, kind),
    }
}
