//! # AutoForge
//!
//! A workflow automation engine. Workflows are directed acyclic graphs of
//! typed action nodes (check out a repository, run a command, call an LLM,
//! wait for a human, fan out child runs over a list) composed in an external
//! builder and executed here against a workspace.
//!
//! ## Features
//!
//! - **Poll-driven execution**: a run is advanced by repeatedly driving it,
//!   so progress survives process restarts
//! - **Pause/resume**: actions can suspend a run awaiting an external event
//!   (a human confirmation, child-run completion) observed on re-poll
//! - **Child-run fan-out**: for-each actions spawn one run per item and the
//!   same poll loop drives parents and children alike
//! - **Pluggable persistence**: in-memory and JSON-file storage backends
//!   behind one gateway
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use autoforge::workflow::{
//!     ActionRegistry, RunDriver, WorkflowRun, WorkflowStorage,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(WorkflowStorage::file_system()?);
//! let driver = RunDriver::new(storage.clone(), Arc::new(ActionRegistry::standard()));
//!
//! let workflow = storage.get_workflow(&"my-workflow".into())?;
//! let run = WorkflowRun::new(&workflow, "my-workspace".into());
//! let run_id = run.id;
//! storage.create_run(run)?;
//!
//! // One drive cycle; a worker loop would call this until terminal.
//! driver.process_run(&run_id).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Unified error types
pub mod error;

/// Workflow engine: definitions, runs, actions, executor, scheduler, storage
pub mod workflow;

pub use error::{AutoForgeError, Result};
