//! Graph utilities for workflow execution
//!
//! Readiness evaluation (which nodes may start now) and the cycle detection
//! pass run at workflow save time. Readiness itself assumes an acyclic
//! graph; cycles are rejected before a workflow ever reaches the engine.

use crate::workflow::{NodeId, StepStatus, Workflow, WorkflowEdge, WorkflowRun};
use std::collections::{HashMap, HashSet};

/// Compute the set of nodes whose dependencies are satisfied and that have
/// not yet been started.
///
/// A node is ready when it is not already in a terminal-or-active status and
/// every incoming edge's source node has status `Success`. Nodes with no
/// incoming edges are trivially ready. Several node IDs may be returned at
/// once (parallel fan-out across independent branches); no ordering is
/// guaranteed among them and the caller may execute them concurrently.
///
/// A `Failed` node permanently excludes itself and everything downstream of
/// it from ever becoming ready again.
pub fn ready_steps(run: &WorkflowRun, workflow: &Workflow) -> Vec<NodeId> {
    let mut edges_by_target: HashMap<&NodeId, Vec<&WorkflowEdge>> = HashMap::new();
    for edge in &workflow.edges {
        edges_by_target.entry(&edge.target).or_default().push(edge);
    }

    let mut executable = Vec::new();

    for node in &workflow.nodes {
        if let Some(state) = run.steps.get(&node.id) {
            match state.status {
                StepStatus::Success
                | StepStatus::Running
                | StepStatus::Paused
                | StepStatus::Failed
                | StepStatus::Skipped => continue,
                StepStatus::Pending => {}
            }
        }

        let deps_met = edges_by_target
            .get(&node.id)
            .map(|incoming| {
                incoming.iter().all(|edge| {
                    run.steps
                        .get(&edge.source)
                        .map(|s| s.status == StepStatus::Success)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(true);

        if deps_met {
            executable.push(node.id.clone());
        }
    }

    executable
}

/// Detect a cycle in the workflow graph, returning the node path that
/// closes it. Used by [`Workflow::validate_structure`] so cyclic graphs
/// fail fast at save time instead of starving at run time.
pub fn find_cycle(workflow: &Workflow) -> Option<Vec<NodeId>> {
    let mut adjacency: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for edge in &workflow.edges {
        adjacency.entry(&edge.source).or_default().push(&edge.target);
    }

    let mut visited: HashSet<&NodeId> = HashSet::new();
    let mut in_path: HashSet<&NodeId> = HashSet::new();
    let mut path: Vec<&NodeId> = Vec::new();

    for node in &workflow.nodes {
        if !visited.contains(&node.id)
            && dfs_cycle(&node.id, &adjacency, &mut visited, &mut in_path, &mut path)
        {
            return Some(path.into_iter().cloned().collect());
        }
    }

    None
}

fn dfs_cycle<'a>(
    node: &'a NodeId,
    adjacency: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
    visited: &mut HashSet<&'a NodeId>,
    in_path: &mut HashSet<&'a NodeId>,
    path: &mut Vec<&'a NodeId>,
) -> bool {
    visited.insert(node);
    in_path.insert(node);
    path.push(node);

    if let Some(next) = adjacency.get(node) {
        for &target in next {
            if in_path.contains(target) {
                path.push(target);
                return true;
            }
            if !visited.contains(target) && dfs_cycle(target, adjacency, visited, in_path, path) {
                return true;
            }
        }
    }

    in_path.remove(node);
    path.pop();
    false
}
