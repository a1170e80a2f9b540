// src/engine/handle.rs

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::{RunReport, Runtime, RuntimeEvent, TaskName};
use crate::errors::{AssetflowError, Result};
use crate::exec::ExecutorBackend;

/// Handle to a run started with `TaskRunner::run`.
#[derive(Debug)]
pub struct RunHandle {
    task: TaskName,
    events: mpsc::Sender<RuntimeEvent>,
    join: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    /// Spawn `runtime` on the current Tokio runtime and seed it with a
    /// request for `task`.
    pub fn spawn<E>(task: TaskName, runtime: Runtime<E>, events: mpsc::Sender<RuntimeEvent>) -> Self
    where
        E: ExecutorBackend + 'static,
    {
        let seed_tx = events.clone();
        let seed_task = task.clone();
        let join = tokio::spawn(async move {
            seed_tx
                .send(RuntimeEvent::TaskRequested { task: seed_task })
                .await
                .map_err(|e| AssetflowError::Other(anyhow::anyhow!("seeding run: {e}")))?;
            drop(seed_tx);
            runtime.run().await
        });

        Self { task, events, join }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Wait until every task in the run has finished.
    pub async fn wait(self) -> Result<RunReport> {
        // Holding the sender keeps the event channel open until the run ends.
        let Self {
            task,
            events: _events,
            join,
        } = self;
        join_report(&task, join).await
    }

    /// Wait for the run, cancelling it if `interrupt` resolves first.
    ///
    /// Cancelling asks the runtime to stop; tasks that have not finished are
    /// reported failed in the returned report.
    pub async fn wait_or_cancel<F>(self, interrupt: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let Self { task, events, join } = self;
        let mut join = std::pin::pin!(join_report(&task, join));
        tokio::select! {
            report = &mut join => return report,
            () = interrupt => {
                let _ = events.send(RuntimeEvent::ShutdownRequested).await;
            }
        }
        join.await
    }
}

async fn join_report(task: &str, join: JoinHandle<Result<RunReport>>) -> Result<RunReport> {
    match join.await {
        Ok(res) => res,
        Err(join_err) => Err(AssetflowError::Other(anyhow::anyhow!(
            "run of task '{task}' aborted: {join_err}"
        ))),
    }
}
