//! Workflow engine data structures and execution
//!
//! This module provides the core types for representing workflows (action
//! nodes wired by dependency edges), the runs that execute them against a
//! workspace, and the poll-driven machinery that moves runs forward.

pub mod actions;
mod definition;
mod executor;
mod graph;
mod resolver;
mod run;
mod scheduler;
mod storage;
#[cfg(test)]
pub(crate) mod test_helpers;
mod workspace;

pub use actions::{
    ActionDefinition, ActionError, ActionInputRequest, ActionOutcome, ActionOutputDefinition,
    ActionParameter, ActionRegistry, ActionResult, ExecutionContext, ExecutionResult, ParamType,
    RunStore, WorkflowAction,
};
pub use definition::{
    ContextSource, InputMapping, InputType, NodeId, Workflow, WorkflowEdge, WorkflowError,
    WorkflowId, WorkflowInput, WorkflowNode, WorkflowResult,
};
pub use executor::{ExecutorError, ExecutorResult, RunDriver};
pub use graph::{find_cycle, ready_steps};
pub use resolver::{resolve_inputs, substitute_variables};
pub use run::{
    PauseReason, RunId, RunPatch, RunStatus, StepExecutionState, StepStatus, UserLogEntry,
    WorkflowRun,
};
pub use scheduler::{RunScheduler, SchedulerConfig};
pub use storage::{
    FileSystemRunStorage, FileSystemWorkflowStorage, FileSystemWorkspaceStorage, MemoryRunStorage,
    MemoryWorkflowStorage, MemoryWorkspaceStorage, RunStorageBackend, WorkflowStorage,
    WorkflowStorageBackend, WorkspaceStorageBackend,
};
pub use workspace::{Workspace, WorkspaceId};
