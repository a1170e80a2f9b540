// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::{TaskName, TaskOutcome};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// The run is over; the shell should stop.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Handle the request that seeds a run.
pub fn handle_task_request(scheduler: &mut Scheduler, task: TaskName, run_id: u64) -> CoreStep {
    let step = scheduler.step_request(&task, run_id);
    core_step_from(step)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.step_completion(&task, outcome);
    core_step_from(step)
}

fn core_step_from(step: SchedulerStep) -> CoreStep {
    let mut commands = Vec::new();

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    let keep_running = !step.run_just_finished;
    if step.run_just_finished {
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}
