// src/exec/executor_loop.rs

//! Executor loop that runs task bodies as they become ready.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName, TaskOutcome};
use crate::exec::task_runner::run_task;
use crate::tasks::TaskBody;

/// Spawn the background executor loop.
///
/// Each scheduled task runs in its own Tokio task, so independent branches
/// of the graph proceed concurrently. The loop ends when the returned sender
/// and every clone of it are dropped.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    bodies: Arc<HashMap<TaskName, TaskBody>>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        debug!("executor loop started");

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &bodies, &runtime_tx).await;
        }

        debug!("executor loop finished (channel closed)");
    });

    tx
}

async fn handle_scheduled_task(
    task: ScheduledTask,
    bodies: &HashMap<TaskName, TaskBody>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let Some(body) = bodies.get(&task.name).cloned() else {
        // Bodiless tasks are resolved by the scheduler and never dispatched.
        warn!(
            task = %task.name,
            run_id = task.run_id,
            "dispatched task has no body; reporting success"
        );
        let _ = runtime_tx
            .send(RuntimeEvent::TaskCompleted {
                task: task.name,
                outcome: TaskOutcome::Success,
            })
            .await;
        return;
    };

    let rt_tx = runtime_tx.clone();
    tokio::spawn(async move {
        run_task(task, body, rt_tx).await;
    });
}
