// src/exec/task_runner.rs

//! Runs a single task body and reports its outcome.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::tasks::TaskBody;

/// Run `body` to completion and emit exactly one `TaskCompleted` event.
///
/// The body runs in its own Tokio task so a panic is contained and reported
/// as a failure instead of tearing down the executor.
pub async fn run_task(task: ScheduledTask, body: TaskBody, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    info!(task = %task.name, run_id = task.run_id, "starting task");
    let started = Instant::now();

    let outcome = match tokio::spawn(body()).await {
        Ok(Ok(())) => TaskOutcome::Success,
        Ok(Err(err)) => TaskOutcome::Failed(format!("{err:#}")),
        Err(join_err) if join_err.is_panic() => {
            TaskOutcome::Failed("task body panicked".to_string())
        }
        Err(join_err) => TaskOutcome::Failed(format!("task body aborted: {join_err}")),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        TaskOutcome::Success => {
            info!(task = %task.name, run_id = task.run_id, elapsed_ms, "task finished");
        }
        TaskOutcome::Failed(reason) => {
            error!(
                task = %task.name,
                run_id = task.run_id,
                elapsed_ms,
                error = %reason,
                "task failed"
            );
        }
    }

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        error!(task = %task.name, run_id = task.run_id, "runtime gone; dropping completion");
    }
}
