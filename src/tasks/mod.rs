// src/tasks/mod.rs

//! Named units of work and their dependency lists.
//!
//! Tasks are registered once at startup. A task has an ordered list of
//! dependencies and an optional async body; aggregate tasks such as
//! `default` or `dist` are pure dependency lists.
//!
//! [`TaskRegistry::into_runner`] validates the graph (unknown dependencies,
//! self-dependencies, cycles) and freezes it into a [`TaskRunner`].

pub mod builtin;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tokio::sync::mpsc;
use tracing::info;

use crate::dag::{DagGraph, Scheduler};
use crate::engine::{CoreRuntime, RunHandle, Runtime, RuntimeEvent, TaskName};
use crate::errors::{AssetflowError, Result};
use crate::exec::RealExecutorBackend;

/// Future returned by a task body.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Zero-argument async action. Called once per run of the task.
pub type TaskBody = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Wrap an async closure as a [`TaskBody`].
pub fn body<F, Fut>(f: F) -> TaskBody
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as TaskFuture)
}

/// A registered task.
#[derive(Clone)]
pub struct TaskDef {
    pub name: TaskName,
    pub deps: Vec<TaskName>,
    pub body: Option<TaskBody>,
}

impl fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDef")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, TaskDef>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with an optional body.
    ///
    /// Registering the same name twice is a configuration error.
    pub fn register(
        &mut self,
        name: impl Into<TaskName>,
        deps: &[&str],
        body: Option<TaskBody>,
    ) -> Result<()> {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(AssetflowError::ConfigError(format!(
                "task '{name}' registered more than once"
            )));
        }
        let def = TaskDef {
            name: name.clone(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            body,
        };
        self.tasks.insert(name, def);
        Ok(())
    }

    /// Register a bodiless task that only groups its dependencies.
    pub fn register_aggregate(&mut self, name: impl Into<TaskName>, deps: &[&str]) -> Result<()> {
        self.register(name, deps, None)
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check dependency names and acyclicity.
    pub fn validate(&self) -> Result<()> {
        self.validate_dependencies()?;
        self.validate_dag()?;
        Ok(())
    }

    fn validate_dependencies(&self) -> Result<()> {
        for (name, task) in self.tasks.iter() {
            for dep in task.deps.iter() {
                if dep == name {
                    return Err(AssetflowError::ConfigError(format!(
                        "task '{name}' cannot depend on itself"
                    )));
                }
                if !self.tasks.contains_key(dep) {
                    return Err(AssetflowError::ConfigError(format!(
                        "task '{name}' has unknown dependency '{dep}'"
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_dag(&self) -> Result<()> {
        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for name in self.tasks.keys() {
            graph.add_node(name.as_str());
        }

        for (name, task) in self.tasks.iter() {
            for dep in task.deps.iter() {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(AssetflowError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// Validate and freeze the registry.
    pub fn into_runner(self) -> Result<TaskRunner> {
        self.validate()?;

        let graph = DagGraph::from_tasks(self.tasks.values());
        let bodies: HashMap<TaskName, TaskBody> = self
            .tasks
            .into_values()
            .filter_map(|t| t.body.map(|b| (t.name, b)))
            .collect();

        Ok(TaskRunner {
            graph: Arc::new(graph),
            bodies: Arc::new(bodies),
            run_counter: Arc::new(AtomicU64::new(0)),
        })
    }
}

/// Validated, immutable task graph that can start runs.
#[derive(Clone)]
pub struct TaskRunner {
    graph: Arc<DagGraph>,
    bodies: Arc<HashMap<TaskName, TaskBody>>,
    run_counter: Arc<AtomicU64>,
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Start a run of `name` and its dependency closure.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&self, name: &str) -> Result<RunHandle> {
        if !self.graph.contains(name) {
            return Err(AssetflowError::TaskNotFound(name.to_string()));
        }

        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        info!(task = %name, run_id, "starting task run");

        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
        let executor = RealExecutorBackend::new(rt_tx.clone(), Arc::clone(&self.bodies));
        let scheduler = Scheduler::new(Arc::clone(&self.graph));
        let core = CoreRuntime::new(scheduler, run_id);
        let runtime = Runtime::new(core, rt_rx, executor);

        Ok(RunHandle::spawn(name.to_string(), runtime, rt_tx))
    }
}
