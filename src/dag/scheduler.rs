// src/dag/scheduler.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{FailureCause, RunState, TaskInfo, TaskRunState};
use crate::engine::{RunReport, TaskName, TaskOutcome};

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - marking the requested task and its dependency closure as part of the run
/// - deciding when a task is ready (all deps succeeded in this run)
/// - recording success and failure
/// - blocking dependents of a failed task
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<DagGraph>,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
    /// Task requested for the active (or last) run.
    requested: Option<TaskName>,
}

impl Scheduler {
    pub fn new(graph: Arc<DagGraph>) -> Self {
        let tasks = graph
            .tasks()
            .map(|name| {
                let deps = graph.dependencies_of(name).to_vec();
                let info = TaskInfo::new(name.to_string(), deps, graph.has_body(name));
                (name.to_string(), info)
            })
            .collect();

        Self {
            graph,
            tasks,
            current_run_id: None,
            requested: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Whether the dependencies of `task` are satisfied for this run.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        Some(ReadOnlyStateManager::new(&self.tasks).deps_satisfied_for_info(info))
    }

    /// Start a run for `task`, resetting all per-run state.
    pub fn step_request(&mut self, task: &str, run_id: u64) -> SchedulerStep {
        if !self.tasks.contains_key(task) {
            warn!(task = %task, "request for unknown task; ignoring");
            return SchedulerStep::default();
        }

        if let Some(active) = self.current_run_id {
            warn!(
                task = %task,
                active_run = active,
                "request while a run is active; restarting scheduler state"
            );
        }

        for info in self.tasks.values_mut() {
            info.run_state = None;
            info.failure = None;
        }
        self.current_run_id = Some(run_id);
        self.requested = Some(task.to_string());
        debug!(task = %task, run_id, "scheduler: starting new run");

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        manager.mark_closure_pending(task);
        let ready = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled: ready.scheduled,
            newly_resolved: ready.resolved,
            run_just_finished,
            ..SchedulerStep::default()
        }
    }

    /// Record the outcome of a dispatched task.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let mut step = SchedulerStep::default();

        let state = self.tasks.get(task).and_then(|info| info.run_state);
        if state != Some(RunState::Running) {
            warn!(task = %task, ?state, "completion for task that is not running; ignoring");
            return step;
        }

        match outcome {
            TaskOutcome::Success => {
                if let Some(info) = self.tasks.get_mut(task) {
                    info.run_state = Some(RunState::DoneSuccess);
                }
                debug!(task = %task, run_id, "task completed successfully");
                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                let ready = manager.collect_new_ready_tasks();
                step.newly_scheduled = ready.scheduled;
                step.newly_resolved = ready.resolved;
            }
            TaskOutcome::Failed(reason) => {
                warn!(
                    task = %task,
                    run_id,
                    reason = %reason,
                    "task failed; dependents will not run"
                );
                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                manager.mark_failed(task, reason);
                step.newly_failed.push(task.to_string());
                step.newly_blocked = manager.mark_dependents_blocked(task);
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Abandon the active run: every pending or running task is marked failed.
    pub fn abandon(&mut self, reason: &str) {
        if self.current_run_id.is_none() {
            return;
        }
        for info in self.tasks.values_mut() {
            if matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            ) {
                info.run_state = Some(RunState::DoneFailed);
                info.failure = Some(FailureCause::Error(reason.to_string()));
            }
        }
        self.current_run_id = None;
    }

    /// Summarise the active (or last) run.
    pub fn report(&self) -> RunReport {
        let mut report = RunReport::new(self.requested.clone().unwrap_or_default());

        let mut infos: Vec<&TaskInfo> = self
            .tasks
            .values()
            .filter(|info| info.run_state.is_some())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));

        for info in infos {
            match (&info.run_state, &info.failure) {
                (Some(RunState::DoneSuccess), _) => report.succeeded.push(info.name.clone()),
                (Some(RunState::DoneFailed), Some(FailureCause::Error(reason))) => {
                    report.failed.push((info.name.clone(), reason.clone()))
                }
                (Some(RunState::DoneFailed), Some(FailureCause::Blocked { .. })) => {
                    report.blocked.push(info.name.clone())
                }
                _ => report.incomplete.push(info.name.clone()),
            }
        }

        report
    }

    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; run finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}
