//! Storage abstractions and implementations for workflows, workspaces and runs
//!
//! The [`WorkflowStorage`] facade is the persistence gateway: the only actor
//! allowed to mutate a run's durable representation. Backends exist in
//! memory (tests, embedding) and on the filesystem (one JSON document per
//! aggregate), both safe to share behind `Arc` across concurrently driven
//! runs.

use crate::workflow::{
    NodeId, RunId, RunPatch, RunStatus, RunStore, StepExecutionState, StepStatus, Workflow,
    WorkflowId, WorkflowRun, Workspace, WorkspaceId,
};
use crate::{AutoForgeError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Helper to walk a directory and load JSON documents of one type
fn load_json_files_from_directory<T, F>(
    directory: &Path,
    filename_filter: Option<&str>,
    mut loader: F,
) -> Result<()>
where
    T: for<'de> serde::Deserialize<'de>,
    F: FnMut(T),
{
    if !directory.exists() {
        return Ok(());
    }

    for entry in walkdir::WalkDir::new(directory)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(filter) = filename_filter {
            if path.file_name().and_then(|s| s.to_str()) != Some(filter) {
                continue;
            }
        } else if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        match std::fs::read_to_string(path)
            .map_err(AutoForgeError::from)
            .and_then(|content| serde_json::from_str::<T>(&content).map_err(AutoForgeError::from))
        {
            Ok(item) => loader(item),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document")
            }
        }
    }

    Ok(())
}

/// Trait for workflow storage backends
pub trait WorkflowStorageBackend: Send + Sync {
    /// Store a workflow, replacing any existing one with the same ID
    fn store_workflow(&self, workflow: Workflow) -> Result<()>;

    /// Get a workflow by ID
    fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow>;

    /// List all workflows
    fn list_workflows(&self) -> Result<Vec<Workflow>>;

    /// Remove a workflow
    fn remove_workflow(&self, id: &WorkflowId) -> Result<()>;
}

/// Trait for workspace storage backends
pub trait WorkspaceStorageBackend: Send + Sync {
    /// Store a workspace, replacing any existing one with the same ID
    fn store_workspace(&self, workspace: Workspace) -> Result<()>;

    /// Get a workspace by ID
    fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace>;

    /// List all workspaces
    fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    /// Remove a workspace
    fn remove_workspace(&self, id: &WorkspaceId) -> Result<()>;
}

/// Trait for run storage backends
pub trait RunStorageBackend: Send + Sync {
    /// Store a run (whole document write)
    fn store_run(&self, run: &WorkflowRun) -> Result<()>;

    /// Get a run by ID
    fn get_run(&self, id: &RunId) -> Result<WorkflowRun>;

    /// List all runs
    fn list_runs(&self) -> Result<Vec<WorkflowRun>>;

    /// Remove a run
    fn remove_run(&self, id: &RunId) -> Result<()>;
}

/// In-memory workflow storage implementation
#[derive(Default)]
pub struct MemoryWorkflowStorage {
    workflows: dashmap::DashMap<WorkflowId, Workflow>,
}

impl MemoryWorkflowStorage {
    /// Create a new memory workflow storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStorageBackend for MemoryWorkflowStorage {
    fn store_workflow(&self, workflow: Workflow) -> Result<()> {
        self.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        self.workflows
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AutoForgeError::WorkflowNotFound(id.to_string()))
    }

    fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self
            .workflows
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove_workflow(&self, id: &WorkflowId) -> Result<()> {
        self.workflows
            .remove(id)
            .ok_or_else(|| AutoForgeError::WorkflowNotFound(id.to_string()))?;
        Ok(())
    }
}

/// In-memory workspace storage implementation
#[derive(Default)]
pub struct MemoryWorkspaceStorage {
    workspaces: dashmap::DashMap<WorkspaceId, Workspace>,
}

impl MemoryWorkspaceStorage {
    /// Create a new memory workspace storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkspaceStorageBackend for MemoryWorkspaceStorage {
    fn store_workspace(&self, workspace: Workspace) -> Result<()> {
        self.workspaces.insert(workspace.id.clone(), workspace);
        Ok(())
    }

    fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace> {
        self.workspaces
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AutoForgeError::WorkspaceNotFound(id.to_string()))
    }

    fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        Ok(self
            .workspaces
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove_workspace(&self, id: &WorkspaceId) -> Result<()> {
        self.workspaces
            .remove(id)
            .ok_or_else(|| AutoForgeError::WorkspaceNotFound(id.to_string()))?;
        Ok(())
    }
}

/// In-memory run storage implementation
#[derive(Default)]
pub struct MemoryRunStorage {
    runs: dashmap::DashMap<RunId, WorkflowRun>,
}

impl MemoryRunStorage {
    /// Create a new memory run storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStorageBackend for MemoryRunStorage {
    fn store_run(&self, run: &WorkflowRun) -> Result<()> {
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    fn get_run(&self, id: &RunId) -> Result<WorkflowRun> {
        self.runs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AutoForgeError::RunNotFound(id.to_string()))
    }

    fn list_runs(&self) -> Result<Vec<WorkflowRun>> {
        Ok(self
            .runs
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove_run(&self, id: &RunId) -> Result<()> {
        self.runs
            .remove(id)
            .ok_or_else(|| AutoForgeError::RunNotFound(id.to_string()))?;
        Ok(())
    }
}

/// File system workflow storage: one `workflows/<id>.json` per workflow
pub struct FileSystemWorkflowStorage {
    directory: PathBuf,
    cache: dashmap::DashMap<WorkflowId, Workflow>,
}

impl FileSystemWorkflowStorage {
    /// Create storage rooted at `base_path`, loading existing documents
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let directory = base_path.as_ref().join("workflows");
        std::fs::create_dir_all(&directory)?;

        let storage = Self {
            directory,
            cache: dashmap::DashMap::new(),
        };
        storage.reload_cache()?;
        Ok(storage)
    }

    /// Reload the cache from disk
    pub fn reload_cache(&self) -> Result<()> {
        self.cache.clear();
        let cache = &self.cache;
        load_json_files_from_directory::<Workflow, _>(&self.directory, None, |workflow| {
            cache.insert(workflow.id.clone(), workflow);
        })
    }

    fn workflow_path(&self, id: &WorkflowId) -> PathBuf {
        self.directory.join(format!("{}.json", id))
    }
}

impl WorkflowStorageBackend for FileSystemWorkflowStorage {
    fn store_workflow(&self, workflow: Workflow) -> Result<()> {
        let content = serde_json::to_string_pretty(&workflow)?;
        std::fs::write(self.workflow_path(&workflow.id), content)?;
        self.cache.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        if let Some(workflow) = self.cache.get(id) {
            return Ok(workflow.clone());
        }

        let path = self.workflow_path(id);
        if !path.exists() {
            return Err(AutoForgeError::WorkflowNotFound(id.to_string()));
        }
        let workflow: Workflow = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        self.cache.insert(id.clone(), workflow.clone());
        Ok(workflow)
    }

    fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self
            .cache
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove_workflow(&self, id: &WorkflowId) -> Result<()> {
        let path = self.workflow_path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        self.cache.remove(id);
        Ok(())
    }
}

/// File system workspace storage: one `workspaces/<id>.json` per workspace
pub struct FileSystemWorkspaceStorage {
    directory: PathBuf,
    cache: dashmap::DashMap<WorkspaceId, Workspace>,
}

impl FileSystemWorkspaceStorage {
    /// Create storage rooted at `base_path`, loading existing documents
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let directory = base_path.as_ref().join("workspaces");
        std::fs::create_dir_all(&directory)?;

        let storage = Self {
            directory,
            cache: dashmap::DashMap::new(),
        };
        let cache = &storage.cache;
        load_json_files_from_directory::<Workspace, _>(&storage.directory, None, |workspace| {
            cache.insert(workspace.id.clone(), workspace);
        })?;
        Ok(storage)
    }

    fn workspace_path(&self, id: &WorkspaceId) -> PathBuf {
        self.directory.join(format!("{}.json", id))
    }
}

impl WorkspaceStorageBackend for FileSystemWorkspaceStorage {
    fn store_workspace(&self, workspace: Workspace) -> Result<()> {
        let content = serde_json::to_string_pretty(&workspace)?;
        std::fs::write(self.workspace_path(&workspace.id), content)?;
        self.cache.insert(workspace.id.clone(), workspace);
        Ok(())
    }

    fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace> {
        if let Some(workspace) = self.cache.get(id) {
            return Ok(workspace.clone());
        }

        let path = self.workspace_path(id);
        if !path.exists() {
            return Err(AutoForgeError::WorkspaceNotFound(id.to_string()));
        }
        let workspace: Workspace = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        self.cache.insert(id.clone(), workspace.clone());
        Ok(workspace)
    }

    fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        Ok(self
            .cache
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove_workspace(&self, id: &WorkspaceId) -> Result<()> {
        let path = self.workspace_path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        self.cache.remove(id);
        Ok(())
    }
}

/// File system run storage: one `runs/<id>/run.json` directory per run
pub struct FileSystemRunStorage {
    base_path: PathBuf,
    cache: dashmap::DashMap<RunId, WorkflowRun>,
}

impl FileSystemRunStorage {
    /// Create storage rooted at `base_path`, loading existing runs
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(base_path.join("runs"))?;

        let storage = Self {
            base_path,
            cache: dashmap::DashMap::new(),
        };
        storage.reload_cache()?;
        Ok(storage)
    }

    /// Reload the cache from disk
    pub fn reload_cache(&self) -> Result<()> {
        self.cache.clear();
        let cache = &self.cache;
        load_json_files_from_directory::<WorkflowRun, _>(
            &self.base_path.join("runs"),
            Some("run.json"),
            |run| {
                cache.insert(run.id, run);
            },
        )
    }

    fn run_dir(&self, id: &RunId) -> PathBuf {
        self.base_path.join("runs").join(id.to_string())
    }

    fn run_path(&self, id: &RunId) -> PathBuf {
        self.run_dir(id).join("run.json")
    }
}

impl RunStorageBackend for FileSystemRunStorage {
    fn store_run(&self, run: &WorkflowRun) -> Result<()> {
        let dir = self.run_dir(&run.id);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        let content = serde_json::to_string_pretty(run)?;
        std::fs::write(self.run_path(&run.id), content)?;
        self.cache.insert(run.id, run.clone());
        Ok(())
    }

    fn get_run(&self, id: &RunId) -> Result<WorkflowRun> {
        if let Some(run) = self.cache.get(id) {
            return Ok(run.clone());
        }

        let path = self.run_path(id);
        if !path.exists() {
            return Err(AutoForgeError::RunNotFound(id.to_string()));
        }
        let run: WorkflowRun = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        self.cache.insert(*id, run.clone());
        Ok(run)
    }

    fn list_runs(&self) -> Result<Vec<WorkflowRun>> {
        Ok(self
            .cache
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove_run(&self, id: &RunId) -> Result<()> {
        let dir = self.run_dir(id);
        if !dir.exists() {
            return Err(AutoForgeError::RunNotFound(id.to_string()));
        }
        std::fs::remove_dir_all(dir)?;
        self.cache.remove(id);
        Ok(())
    }
}

/// The persistence gateway combining workflow, workspace and run backends
pub struct WorkflowStorage {
    workflow_backend: Arc<dyn WorkflowStorageBackend>,
    workspace_backend: Arc<dyn WorkspaceStorageBackend>,
    run_backend: Arc<dyn RunStorageBackend>,
}

impl WorkflowStorage {
    /// Create a new storage gateway from explicit backends
    pub fn new(
        workflow_backend: Arc<dyn WorkflowStorageBackend>,
        workspace_backend: Arc<dyn WorkspaceStorageBackend>,
        run_backend: Arc<dyn RunStorageBackend>,
    ) -> Self {
        Self {
            workflow_backend,
            workspace_backend,
            run_backend,
        }
    }

    /// Create with memory backends
    pub fn memory() -> Self {
        Self::new(
            Arc::new(MemoryWorkflowStorage::new()),
            Arc::new(MemoryWorkspaceStorage::new()),
            Arc::new(MemoryRunStorage::new()),
        )
    }

    /// Create with file system backends under `~/.autoforge`
    pub fn file_system() -> Result<Self> {
        let base_path = dirs::home_dir()
            .ok_or_else(|| {
                AutoForgeError::Storage(
                    "Cannot find home directory. Please ensure HOME environment variable is set"
                        .to_string(),
                )
            })?
            .join(".autoforge");
        Self::file_system_at(base_path)
    }

    /// Create with file system backends under an explicit base path
    pub fn file_system_at(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        Ok(Self::new(
            Arc::new(FileSystemWorkflowStorage::new(base_path)?),
            Arc::new(FileSystemWorkspaceStorage::new(base_path)?),
            Arc::new(FileSystemRunStorage::new(base_path)?),
        ))
    }

    /// Store a workflow
    pub fn store_workflow(&self, workflow: Workflow) -> Result<()> {
        self.workflow_backend.store_workflow(workflow)
    }

    /// Get a workflow by ID
    pub fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        self.workflow_backend.get_workflow(id)
    }

    /// List all workflows
    pub fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.workflow_backend.list_workflows()
    }

    /// Store a workspace
    pub fn store_workspace(&self, workspace: Workspace) -> Result<()> {
        self.workspace_backend.store_workspace(workspace)
    }

    /// Get a workspace by ID
    pub fn get_workspace(&self, id: &WorkspaceId) -> Result<Workspace> {
        self.workspace_backend.get_workspace(id)
    }

    /// List all workspaces
    pub fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        self.workspace_backend.list_workspaces()
    }

    /// Persist a newly created run
    pub fn create_run(&self, run: WorkflowRun) -> Result<()> {
        self.run_backend.store_run(&run)
    }

    /// Get a run by ID
    pub fn get_run(&self, id: &RunId) -> Result<WorkflowRun> {
        self.run_backend.get_run(id)
    }

    /// List all runs
    pub fn list_runs(&self) -> Result<Vec<WorkflowRun>> {
        self.run_backend.list_runs()
    }

    /// Merge a partial update into a run.
    ///
    /// Read-merge-write: concurrent writers are reconciled at the
    /// granularity of one gateway call, last write wins. This is an accepted
    /// tradeoff; at most one driver process is expected per run.
    pub fn update_run(&self, id: &RunId, patch: RunPatch) -> Result<()> {
        let mut run = self.run_backend.get_run(id)?;
        patch.apply_to(&mut run);
        self.run_backend.store_run(&run)
    }

    /// Merge one step's state into a run
    pub fn update_run_step(&self, run_id: &RunId, step: StepExecutionState) -> Result<()> {
        self.update_run(run_id, RunPatch::new().with_step(step))
    }

    /// Set a run's status
    pub fn set_run_status(&self, id: &RunId, status: RunStatus) -> Result<()> {
        self.update_run(id, RunPatch::new().with_status(status))
    }

    /// Force a run to `Cancelled`, removing it from future scheduling.
    /// Cooperative: an in-flight drive cycle is not interrupted.
    pub fn cancel_run(&self, id: &RunId) -> Result<()> {
        self.set_run_status(id, RunStatus::Cancelled)
    }

    /// Resolve a paused step from outside the engine (the human side of
    /// pause/resume): mark it successful with the given outputs, clear the
    /// pause marker, and wake the run if it was paused.
    pub fn resume_step(
        &self,
        run_id: &RunId,
        step_id: &NodeId,
        outputs: HashMap<String, Value>,
    ) -> Result<()> {
        let run = self.run_backend.get_run(run_id)?;
        let mut step = run
            .steps
            .get(step_id)
            .cloned()
            .ok_or_else(|| {
                AutoForgeError::Storage(format!("Run {run_id} has no step '{step_id}'"))
            })?;

        if step.status != StepStatus::Paused {
            return Err(AutoForgeError::Storage(format!(
                "Step '{step_id}' is {}, only paused steps can be resumed",
                step.status
            )));
        }

        step.status = StepStatus::Success;
        step.pause = None;
        step.outputs.extend(outputs);
        step.end_time = Some(chrono::Utc::now());

        let mut patch = RunPatch::new().with_step(step);
        if run.status == RunStatus::Paused {
            patch = patch.with_status(RunStatus::Running);
        }
        self.update_run(run_id, patch)
    }

    /// Runs the scheduler should drive, in admission priority order:
    /// running before paused, then oldest start time first
    pub fn list_active_runs(&self) -> Result<Vec<WorkflowRun>> {
        let mut runs: Vec<WorkflowRun> = self
            .run_backend
            .list_runs()?
            .into_iter()
            .filter(|run| run.status.is_active())
            .collect();
        runs.sort_by_key(|run| {
            let priority = match run.status {
                RunStatus::Running => 0,
                _ => 1,
            };
            (priority, run.start_time)
        });
        Ok(runs)
    }
}

impl RunStore for WorkflowStorage {
    fn get_run(&self, id: &RunId) -> Result<WorkflowRun> {
        WorkflowStorage::get_run(self, id)
    }

    fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        WorkflowStorage::get_workflow(self, id)
    }

    fn create_run(&self, run: WorkflowRun) -> Result<()> {
        WorkflowStorage::create_run(self, run)
    }

    fn update_run(&self, id: &RunId, patch: RunPatch) -> Result<()> {
        WorkflowStorage::update_run(self, id, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_helpers::*;
    use serde_json::json;

    #[test]
    fn test_memory_workflow_round_trip() {
        let storage = WorkflowStorage::memory();
        let workflow = create_linear_workflow();
        storage.store_workflow(workflow.clone()).unwrap();

        let loaded = storage.get_workflow(&workflow.id).unwrap();
        assert_eq!(loaded, workflow);

        assert!(matches!(
            storage.get_workflow(&"nope".into()),
            Err(AutoForgeError::WorkflowNotFound(_))
        ));
    }

    #[test]
    fn test_update_run_merges_steps() {
        let storage = WorkflowStorage::memory();
        let workflow = create_linear_workflow();
        let run = WorkflowRun::new(&workflow, "ws-1".into());
        let run_id = run.id;
        storage.create_run(run).unwrap();

        let mut first = StepExecutionState::new("step-1".into());
        first.status = StepStatus::Success;
        storage.update_run_step(&run_id, first).unwrap();

        let mut second = StepExecutionState::new("step-2".into());
        second.status = StepStatus::Running;
        storage.update_run_step(&run_id, second).unwrap();

        let loaded = storage.get_run(&run_id).unwrap();
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(
            loaded.steps[&NodeId::from("step-1")].status,
            StepStatus::Success
        );
    }

    #[test]
    fn test_active_runs_priority_order() {
        let storage = WorkflowStorage::memory();
        let workflow = create_linear_workflow();

        let mut paused_old = WorkflowRun::new(&workflow, "ws-1".into());
        paused_old.status = RunStatus::Paused;
        paused_old.start_time = chrono::Utc::now() - chrono::Duration::minutes(10);

        let mut running_old = WorkflowRun::new(&workflow, "ws-1".into());
        running_old.start_time = chrono::Utc::now() - chrono::Duration::minutes(5);

        let running_new = WorkflowRun::new(&workflow, "ws-1".into());

        let mut done = WorkflowRun::new(&workflow, "ws-1".into());
        done.status = RunStatus::Completed;

        for run in [&paused_old, &running_old, &running_new, &done] {
            storage.create_run((*run).clone()).unwrap();
        }

        let active = storage.list_active_runs().unwrap();
        let ids: Vec<RunId> = active.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![running_old.id, running_new.id, paused_old.id]);
    }

    #[test]
    fn test_cancel_run_is_terminal() {
        let storage = WorkflowStorage::memory();
        let workflow = create_linear_workflow();
        let run = WorkflowRun::new(&workflow, "ws-1".into());
        let run_id = run.id;
        storage.create_run(run).unwrap();

        storage.cancel_run(&run_id).unwrap();
        let loaded = storage.get_run(&run_id).unwrap();
        assert_eq!(loaded.status, RunStatus::Cancelled);
        assert!(loaded.end_time.is_some());
        assert!(storage.list_active_runs().unwrap().is_empty());
    }

    #[test]
    fn test_resume_step_wakes_paused_run() {
        let storage = WorkflowStorage::memory();
        let workflow = create_linear_workflow();
        let mut run = WorkflowRun::new(&workflow, "ws-1".into());
        run.status = RunStatus::Paused;
        let mut step = StepExecutionState::new("step-1".into());
        step.status = StepStatus::Paused;
        step.pause = Some(crate::workflow::PauseReason::AwaitingInput);
        run.steps.insert("step-1".into(), step);
        let run_id = run.id;
        storage.create_run(run).unwrap();

        let mut outputs = HashMap::new();
        outputs.insert("value".to_string(), json!("https://x/y.git"));
        storage
            .resume_step(&run_id, &"step-1".into(), outputs)
            .unwrap();

        let loaded = storage.get_run(&run_id).unwrap();
        let step = &loaded.steps[&NodeId::from("step-1")];
        assert_eq!(step.status, StepStatus::Success);
        assert!(step.pause.is_none());
        assert_eq!(step.outputs["value"], json!("https://x/y.git"));
        assert_eq!(loaded.status, RunStatus::Running);
    }

    #[test]
    fn test_resume_step_rejects_non_paused() {
        let storage = WorkflowStorage::memory();
        let workflow = create_linear_workflow();
        let mut run = WorkflowRun::new(&workflow, "ws-1".into());
        let mut step = StepExecutionState::new("step-1".into());
        step.status = StepStatus::Success;
        run.steps.insert("step-1".into(), step);
        let run_id = run.id;
        storage.create_run(run).unwrap();

        assert!(storage
            .resume_step(&run_id, &"step-1".into(), HashMap::new())
            .is_err());
    }

    #[test]
    fn test_file_system_round_trip_and_reload() {
        let dir = tempfile::tempdir().unwrap();

        let workflow = create_linear_workflow();
        let workspace = create_workspace("/tmp/work");
        let run_id;
        {
            let storage = WorkflowStorage::file_system_at(dir.path()).unwrap();
            storage.store_workflow(workflow.clone()).unwrap();
            storage.store_workspace(workspace.clone()).unwrap();

            let mut run = WorkflowRun::new(&workflow, workspace.id.clone());
            run.status = RunStatus::Paused;
            run_id = run.id;
            storage.create_run(run).unwrap();
        }

        // A fresh gateway over the same directory sees everything: this is
        // what crash/restart resume relies on
        let reloaded = WorkflowStorage::file_system_at(dir.path()).unwrap();
        assert_eq!(reloaded.get_workflow(&workflow.id).unwrap(), workflow);
        assert_eq!(reloaded.get_workspace(&workspace.id).unwrap(), workspace);
        let run = reloaded.get_run(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Paused);
        assert_eq!(reloaded.list_active_runs().unwrap().len(), 1);
    }

    #[test]
    fn test_file_system_missing_run() {
        let dir = tempfile::tempdir().unwrap();
        let storage = WorkflowStorage::file_system_at(dir.path()).unwrap();
        assert!(matches!(
            storage.get_run(&RunId::new()),
            Err(AutoForgeError::RunNotFound(_))
        ));
    }
}
