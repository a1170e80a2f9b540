// src/dag/task_info.rs

//! Task metadata and per-run state.

use crate::engine::TaskName;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    DoneSuccess,
    /// Failed in this run, or blocked by a failed dependency.
    DoneFailed,
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not participating in this run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

/// Why a task ended up `DoneFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The task body returned an error or panicked.
    Error(String),
    /// An upstream task failed, so this one never ran.
    Blocked { upstream: TaskName },
}

/// Static task information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Direct dependencies for this task.
    pub deps: Vec<TaskName>,
    pub has_body: bool,

    /// Per-run state (None if not participating in the run).
    pub run_state: Option<RunState>,

    pub failure: Option<FailureCause>,
}

impl TaskInfo {
    pub fn new(name: TaskName, deps: Vec<TaskName>, has_body: bool) -> Self {
        Self {
            name,
            deps,
            has_body,
            run_state: None,
            failure: None,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub name: TaskName,
    /// Identifier shared by every task dispatched for the same run.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            run_id,
        }
    }
}
