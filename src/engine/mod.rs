// src/engine/mod.rs

//! Orchestration engine for task runs.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the runtime event loop that reacts to task requests, task completion
//!   and shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. A started run is observed through a
//! [`RunHandle`].

use std::fmt;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task body for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(String),
}

/// Events flowing into the runtime from the caller and the executor.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Start a run of this task and its dependency closure.
    TaskRequested { task: TaskName },
    /// A task body finished.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// The task that was requested.
    pub task: TaskName,
    pub succeeded: Vec<TaskName>,
    /// Tasks whose own body failed, with the failure message.
    pub failed: Vec<(TaskName, String)>,
    /// Tasks that did not run because a dependency failed.
    pub blocked: Vec<TaskName>,
    /// Tasks still pending or running when the run was cut short.
    pub incomplete: Vec<TaskName>,
}

impl RunReport {
    pub fn new(task: impl Into<TaskName>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty() && self.incomplete.is_empty()
    }

    pub fn did_succeed(&self, task: &str) -> bool {
        self.succeeded.iter().any(|t| t == task)
    }

    pub fn did_fail(&self, task: &str) -> bool {
        self.failed.iter().any(|(t, _)| t == task)
    }

    pub fn was_blocked(&self, task: &str) -> bool {
        self.blocked.iter().any(|t| t == task)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return write!(
                f,
                "task '{}' finished ({} tasks succeeded)",
                self.task,
                self.succeeded.len()
            );
        }

        write!(f, "task '{}' failed", self.task)?;
        for (name, reason) in &self.failed {
            write!(f, "; {name}: {reason}")?;
        }
        if !self.blocked.is_empty() {
            write!(f, "; blocked: {}", self.blocked.join(", "))?;
        }
        if !self.incomplete.is_empty() {
            write!(f, "; incomplete: {}", self.incomplete.join(", "))?;
        }
        Ok(())
    }
}

pub mod core;
pub mod event_handlers;
pub mod handle;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use handle::RunHandle;
pub use runtime::Runtime;
