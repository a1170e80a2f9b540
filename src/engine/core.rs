// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels
//! and hands `ScheduledTask`s to the executor. The core itself can be tested
//! without any Tokio, channels, filesystem, or processes.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{CoreStep, handle_task_completion, handle_task_request};
use crate::engine::{RunReport, RuntimeEvent};

/// Pure core runtime state for a single task run.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    run_id: u64,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, run_id: u64) -> Self {
        Self { scheduler, run_id }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskRequested { task } => {
                handle_task_request(&mut self.scheduler, task, self.run_id)
            }
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut self.scheduler, task, outcome)
            }
            RuntimeEvent::ShutdownRequested => {
                self.scheduler.abandon("shutdown requested");
                CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                }
            }
        }
    }

    /// Summary of the run so far.
    pub fn report(&self) -> RunReport {
        self.scheduler.report()
    }
}
