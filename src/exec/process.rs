// src/exec/process.rs

//! Supervision of long-running child processes (the dev server).
//!
//! At most one instance per name runs at a time: `restart` stops the previous
//! instance before the new one is spawned.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How to launch a supervised process.
///
/// The environment block is explicit: every variable the process needs is
/// listed here rather than inherited through mutation of our own env.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Internal handle for a running process.
///
/// - `cancel` asks the watcher task to kill the child.
/// - `handle` is the Tokio task waiting on the child.
struct ActiveProcess {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct ProcessSupervisor {
    active: Arc<Mutex<HashMap<String, ActiveProcess>>>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor").finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop any running instance called `name` and start `spec` in its place.
    pub async fn restart(&self, name: &str, spec: ProcessSpec) -> Result<()> {
        let mut active = self.active.lock().await;

        if let Some(existing) = active.remove(name) {
            stop_process(name, existing).await;
        }

        let child = spawn_child(name, &spec)?;
        info!(
            process = %name,
            program = %spec.program.display(),
            cwd = %spec.cwd.display(),
            "started process"
        );

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(supervise(name.to_string(), child, cancel_rx));

        active.insert(
            name.to_string(),
            ActiveProcess {
                cancel: Some(cancel_tx),
                handle,
            },
        );
        Ok(())
    }

    /// Stop every supervised process.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, ActiveProcess)> = self.active.lock().await.drain().collect();
        for (name, existing) in drained {
            stop_process(&name, existing).await;
        }
    }

    /// Whether an instance called `name` is still alive.
    pub async fn is_running(&self, name: &str) -> bool {
        self.active
            .lock()
            .await
            .get(name)
            .is_some_and(|p| !p.handle.is_finished())
    }
}

fn spawn_child(name: &str, spec: &ProcessSpec) -> Result<Child> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process '{name}' ({})", spec.program.display()))?;

    if let Some(stdout) = child.stdout.take() {
        let name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(process = %name, "{}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(process = %name, "{}", line);
            }
        });
    }

    Ok(child)
}

async fn supervise(name: String, mut child: Child, mut cancel_rx: oneshot::Receiver<()>) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => info!(
                    process = %name,
                    exit_code = status.code().unwrap_or(-1),
                    success = status.success(),
                    "process exited"
                ),
                Err(e) => warn!(process = %name, error = %e, "waiting for process failed"),
            }
        }
        _ = &mut cancel_rx => {
            debug!(process = %name, "stopping process");
            if let Err(e) = child.kill().await {
                warn!(process = %name, error = %e, "failed to kill process");
            }
        }
    }
}

async fn stop_process(name: &str, mut existing: ActiveProcess) {
    if let Some(cancel) = existing.cancel.take() {
        if cancel.send(()).is_err() {
            debug!(process = %name, "process already finished");
        }
    }
    if let Err(e) = existing.handle.await {
        warn!(process = %name, error = %e, "process supervisor task failed");
    }
}
