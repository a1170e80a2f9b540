// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
///
/// Tests can step the DAG manually and make assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks with a body that became ready to run in this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Bodiless tasks whose dependencies all completed in this step.
    pub newly_resolved: Vec<TaskName>,
    /// Tasks whose own body failed in this step.
    pub newly_failed: Vec<TaskName>,
    /// Dependents that will not run because of an upstream failure.
    pub newly_blocked: Vec<TaskName>,
    /// Whether this step finished the run (the scheduler is now idle).
    pub run_just_finished: bool,
}
