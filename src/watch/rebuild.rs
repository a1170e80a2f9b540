// src/watch/rebuild.rs

//! Per-pipeline rebuild loop.
//!
//! One loop task owns one pipeline and builds sequentially, so two rebuilds
//! of the same pipeline never overlap. After the first change the loop waits
//! for the debounce window and drains everything pending into one batch.
//! Changes that arrive while a rebuild is running are either merged into a
//! single follow-up rebuild (`queue`) or discarded (`drop`).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{VariantConfig, WatchSection};
use crate::pipeline::{AssetPipeline, PipelineRun, RunEnd};
use crate::report::ErrorReporter;
use crate::types::{ChangeEvent, RebuildBehaviour};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSettings {
    pub behaviour: RebuildBehaviour,
    pub debounce: Duration,
}

impl RebuildSettings {
    pub fn from_config(watch: &WatchSection) -> Self {
        Self {
            behaviour: watch.triggered_while_running_behaviour,
            debounce: Duration::from_millis(watch.debounce_ms),
        }
    }
}

impl Default for RebuildSettings {
    fn default() -> Self {
        Self::from_config(&WatchSection::default())
    }
}

/// Result of one rebuild, broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub pipeline: String,
    /// The batch of changes this rebuild observed.
    pub changes: Vec<ChangeEvent>,
    pub end: RunEnd,
}

/// Changes recorded while a rebuild is in flight.
///
/// In `Queue` mode every recorded change is kept (deduplicated by path, the
/// latest kind wins) and handed to exactly one follow-up rebuild. In `Drop`
/// mode nothing is kept.
#[derive(Debug)]
pub struct RebuildQueue {
    behaviour: RebuildBehaviour,
    pending: Vec<ChangeEvent>,
}

impl RebuildQueue {
    pub fn new(behaviour: RebuildBehaviour) -> Self {
        Self {
            behaviour,
            pending: Vec::new(),
        }
    }

    pub fn behaviour(&self) -> RebuildBehaviour {
        self.behaviour
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Record a change that arrived during a rebuild.
    pub fn record(&mut self, event: ChangeEvent) {
        match self.behaviour {
            RebuildBehaviour::Queue => {
                debug!(path = %event.rel_str(), "queued change for follow-up rebuild");
                merge_change(&mut self.pending, event);
            }
            RebuildBehaviour::Drop => {
                debug!(path = %event.rel_str(), "dropping change that arrived mid-rebuild");
            }
        }
    }

    /// Take every queued change as one batch.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Insert `event` into `batch`, replacing an earlier change to the same path.
pub fn merge_change(batch: &mut Vec<ChangeEvent>, event: ChangeEvent) {
    match batch.iter_mut().find(|e| e.path == event.path) {
        Some(existing) => existing.kind = event.kind,
        None => batch.push(event),
    }
}

/// Handle to a running rebuild loop.
#[derive(Debug)]
pub struct RebuildHandle {
    sender: mpsc::UnboundedSender<ChangeEvent>,
    outcomes: broadcast::Sender<RebuildOutcome>,
    join: JoinHandle<()>,
}

impl RebuildHandle {
    /// Sender feeding changes into the loop.
    pub fn sender(&self) -> mpsc::UnboundedSender<ChangeEvent> {
        self.sender.clone()
    }

    /// Push one change into the loop. Returns `false` once the loop is gone.
    pub fn notify(&self, event: ChangeEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Receive the outcome of every subsequent rebuild.
    pub fn subscribe(&self) -> broadcast::Receiver<RebuildOutcome> {
        self.outcomes.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop. A rebuild in flight is abandoned.
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Spawn the rebuild loop for `pipeline`.
pub fn spawn_rebuild_loop(
    pipeline: Arc<dyn AssetPipeline>,
    config: VariantConfig,
    reporter: ErrorReporter,
    settings: RebuildSettings,
) -> RebuildHandle {
    let (sender, rx) = mpsc::unbounded_channel::<ChangeEvent>();
    let (outcomes, _) = broadcast::channel::<RebuildOutcome>(16);

    let loop_outcomes = outcomes.clone();
    let join = tokio::spawn(rebuild_loop(pipeline, config, reporter, settings, rx, loop_outcomes));

    RebuildHandle {
        sender,
        outcomes,
        join,
    }
}

async fn rebuild_loop(
    pipeline: Arc<dyn AssetPipeline>,
    config: VariantConfig,
    reporter: ErrorReporter,
    settings: RebuildSettings,
    mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    outcomes: broadcast::Sender<RebuildOutcome>,
) {
    let name = pipeline.name().to_string();
    let mut queue = RebuildQueue::new(settings.behaviour);
    debug!(pipeline = %name, behaviour = ?settings.behaviour, "rebuild loop started");

    loop {
        let mut batch = if queue.is_empty() {
            let Some(first) = rx.recv().await else {
                break;
            };
            vec![first]
        } else {
            queue.drain()
        };

        if !settings.debounce.is_zero() {
            tokio::time::sleep(settings.debounce).await;
        }
        while let Ok(event) = rx.try_recv() {
            merge_change(&mut batch, event);
        }

        batch.retain(|e| pipeline.tracks(&e.rel_str()));
        if batch.is_empty() {
            debug!(pipeline = %name, "changes outside pipeline sources; skipping rebuild");
            continue;
        }

        let paths: Vec<String> = batch.iter().map(ChangeEvent::rel_str).collect();
        info!(pipeline = %name, changes = ?paths, "rebuilding");

        let run = PipelineRun::start(
            Arc::clone(&pipeline),
            config.clone(),
            batch.clone(),
            reporter.clone(),
        );
        let end = run.finish().await;

        let _ = outcomes.send(RebuildOutcome {
            pipeline: name.clone(),
            changes: batch,
            end,
        });

        while let Ok(event) = rx.try_recv() {
            queue.record(event);
        }
    }

    debug!(pipeline = %name, "rebuild loop finished");
}
