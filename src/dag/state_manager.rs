// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::DagGraph;
use crate::dag::task_info::{FailureCause, RunState, ScheduledTask, TaskInfo};
use crate::engine::TaskName;

/// Tasks that changed state while collecting ready work.
#[derive(Debug, Default)]
pub struct ReadySet {
    pub scheduled: Vec<ScheduledTask>,
    pub resolved: Vec<TaskName>,
}

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Include the requested task and everything it transitively depends on
    /// in this run.
    ///
    /// Tasks already participating keep their state.
    pub fn mark_closure_pending(&mut self, root: &str) {
        let mut stack: Vec<TaskName> = vec![root.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            if let Some(info) = self.tasks.get_mut(&name) {
                if info.run_state.is_none() {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %info.name, "marked Pending for this run");
                }

                stack.extend(self.graph.dependencies_of(&name).iter().cloned());
            } else {
                warn!(task = %name, "node in DAG not present in tasks map");
            }
        }
    }

    /// Whether every dependency of `info` completed successfully in this run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        ReadOnlyStateManager::new(self.tasks).deps_satisfied_for_info(info)
    }

    /// Mark a task as failed by its own body.
    pub fn mark_failed(&mut self, task: &str, reason: String) -> bool {
        match self.tasks.get_mut(task) {
            Some(info) => {
                info.run_state = Some(RunState::DoneFailed);
                info.failure = Some(FailureCause::Error(reason));
                true
            }
            None => false,
        }
    }

    /// Mark every pending dependent (transitively) of a failed task as
    /// blocked for this run.
    ///
    /// Returns the newly blocked tasks, excluding `failed_task` itself.
    pub fn mark_dependents_blocked(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<(TaskName, TaskName)> = self
            .graph
            .dependents_of(failed_task)
            .iter()
            .map(|d| (d.clone(), failed_task.to_string()))
            .collect();

        let mut newly_blocked = Vec::new();

        while let Some((name, upstream)) = stack.pop() {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };

            match info.run_state {
                Some(RunState::Pending) => {
                    info.run_state = Some(RunState::DoneFailed);
                    info.failure = Some(FailureCause::Blocked {
                        upstream: upstream.clone(),
                    });
                    debug!(
                        task = %info.name,
                        upstream = %upstream,
                        "marking dependent as blocked due to upstream failure"
                    );
                    newly_blocked.push(info.name.clone());
                    stack.extend(
                        self.graph
                            .dependents_of(&name)
                            .iter()
                            .map(|d| (d.clone(), upstream.clone())),
                    );
                }
                // Running dependents cannot exist (deps were not done), and
                // terminal or non-participating tasks are left alone.
                Some(RunState::Running)
                | Some(RunState::DoneSuccess)
                | Some(RunState::DoneFailed)
                | None => {}
            }
        }

        newly_blocked
    }

    /// Collect tasks that are `Pending` with all dependencies satisfied.
    ///
    /// Tasks with a body are marked `Running` and returned for dispatch.
    /// Bodiless tasks resolve to `DoneSuccess` on the spot, which may in turn
    /// release their dependents, so this loops until nothing changes.
    pub fn collect_new_ready_tasks(&mut self) -> ReadySet {
        let mut ready = ReadySet::default();

        loop {
            let mut candidates: Vec<TaskName> = self
                .tasks
                .values()
                .filter(|info| {
                    matches!(info.run_state, Some(RunState::Pending))
                        && self.deps_satisfied_for_info(info)
                })
                .map(|info| info.name.clone())
                .collect();

            if candidates.is_empty() {
                break;
            }
            candidates.sort();

            for name in candidates {
                let Some(info) = self.tasks.get_mut(&name) else {
                    continue;
                };

                if info.has_body {
                    info!(
                        task = %info.name,
                        run_id = self.current_run_id,
                        "dependencies satisfied; starting task"
                    );
                    info.run_state = Some(RunState::Running);
                    ready.scheduled.push(ScheduledTask::from_task_info(
                        info,
                        self.current_run_id.unwrap_or(0),
                    ));
                } else {
                    debug!(
                        task = %info.name,
                        run_id = self.current_run_id,
                        "bodiless task resolved"
                    );
                    info.run_state = Some(RunState::DoneSuccess);
                    ready.resolved.push(info.name.clone());
                }
            }
        }

        ready
    }

    /// Check if all participating tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// Read-only view for dependency checks with shared access to the tasks map.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// Whether every dependency of `info` is `DoneSuccess` in this run.
    ///
    /// There is no carry-over between runs: a dependency that is not part of
    /// the run is never satisfied.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| match self.tasks.get(dep_name) {
            Some(dep) => matches!(dep.run_state, Some(RunState::DoneSuccess)),
            None => {
                warn!(
                    task = %info.name,
                    dep = %dep_name,
                    "dependency missing from tasks map"
                );
                false
            }
        })
    }
}
