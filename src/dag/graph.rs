// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::engine::TaskName;
use crate::tasks::TaskDef;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must complete before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
    /// Whether the task has a body to execute.
    has_body: bool,
}

/// In-memory DAG keyed by task name.
///
/// Acyclicity is checked by `TaskRegistry::validate`; here we only keep
/// adjacency information for scheduling and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
}

impl DagGraph {
    /// Build a DAG from validated task definitions.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a TaskDef>) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();

        for task in tasks {
            nodes.insert(
                task.name.clone(),
                DagNode {
                    deps: task.deps.clone(),
                    dependents: Vec::new(),
                    has_body: task.body.is_some(),
                },
            );
        }

        Self::link_dependents(nodes)
    }

    /// Build a DAG from plain `(name, deps, has_body)` triples.
    pub fn from_edges<N, D>(entries: impl IntoIterator<Item = (N, Vec<D>, bool)>) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        let nodes = entries
            .into_iter()
            .map(|(name, deps, has_body)| {
                (
                    name.into(),
                    DagNode {
                        deps: deps.into_iter().map(Into::into).collect(),
                        dependents: Vec::new(),
                        has_body,
                    },
                )
            })
            .collect();

        Self::link_dependents(nodes)
    }

    fn link_dependents(mut nodes: HashMap<String, DagNode>) -> Self {
        let task_names: Vec<String> = nodes.keys().cloned().collect();
        for task_name in task_names {
            let deps = nodes
                .get(&task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }

        for node in nodes.values_mut() {
            node.dependents.sort();
        }

        Self { nodes }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Return all task names.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn has_body(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(|n| n.has_body)
    }

    /// Immediate dependencies of a task, in registration order.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// `name` plus everything it transitively depends on.
    pub fn dependency_closure(&self, name: &str) -> HashSet<TaskName> {
        let mut closure = HashSet::new();
        let mut stack = vec![name.to_string()];

        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(&current) || !closure.insert(current.clone()) {
                continue;
            }
            stack.extend(self.dependencies_of(&current).iter().cloned());
        }

        closure
    }

    /// Dependency closure of `name` in an order where every task comes after
    /// its dependencies. Ties are broken by name so output is stable.
    pub fn execution_order(&self, name: &str) -> Vec<TaskName> {
        let closure = self.dependency_closure(name);
        let mut done: HashSet<TaskName> = HashSet::new();
        let mut order = Vec::with_capacity(closure.len());

        while order.len() < closure.len() {
            let ready: BTreeSet<&String> = closure
                .iter()
                .filter(|t| !done.contains(*t))
                .filter(|t| self.dependencies_of(t).iter().all(|d| done.contains(d)))
                .collect();

            if ready.is_empty() {
                // Only reachable with an unvalidated cyclic graph.
                break;
            }

            for task in ready {
                done.insert(task.clone());
                order.push(task.clone());
            }
        }

        order
    }
}
