// tests/scheduler_steps.rs

use std::collections::HashSet;
use std::sync::Arc;

use assetflow::dag::{DagGraph, Scheduler, TaskRunState};
use assetflow::engine::TaskOutcome;
use proptest::prelude::*;

fn names(tasks: &[assetflow::dag::ScheduledTask]) -> Vec<&str> {
    tasks.iter().map(|t| t.name.as_str()).collect()
}

/// clean -> {js, css}; server after clean + templates; default groups all.
fn dev_graph() -> Arc<DagGraph> {
    Arc::new(DagGraph::from_edges(vec![
        ("clean-dev", vec![], true),
        ("js-dev", vec!["clean-dev"], true),
        ("css-dev", vec!["clean-dev"], true),
        ("templates-dev", vec!["clean-dev"], true),
        ("server-dev", vec!["clean-dev", "templates-dev"], true),
        (
            "default",
            vec!["js-dev", "css-dev", "templates-dev", "server-dev"],
            false,
        ),
        ("unrelated", vec![], true),
    ]))
}

#[test]
fn request_schedules_only_roots_of_the_closure() {
    let mut scheduler = Scheduler::new(dev_graph());
    let step = scheduler.step_request("default", 1);

    assert_eq!(names(&step.newly_scheduled), vec!["clean-dev"]);
    assert!(!step.run_just_finished);
    assert_eq!(
        scheduler.run_state_of("unrelated"),
        Some(TaskRunState::NotInRun)
    );
    assert_eq!(scheduler.run_state_of("js-dev"), Some(TaskRunState::Pending));
    assert_eq!(scheduler.current_run_id(), Some(1));
}

#[test]
fn completion_releases_dependents_in_name_order() {
    let mut scheduler = Scheduler::new(dev_graph());
    scheduler.step_request("default", 1);

    let step = scheduler.step_completion("clean-dev", TaskOutcome::Success);
    assert_eq!(
        names(&step.newly_scheduled),
        vec!["css-dev", "js-dev", "templates-dev"]
    );
    assert_eq!(scheduler.deps_satisfied("server-dev"), Some(false));

    let step = scheduler.step_completion("templates-dev", TaskOutcome::Success);
    assert_eq!(names(&step.newly_scheduled), vec!["server-dev"]);
}

#[test]
fn bodiless_aggregate_resolves_when_its_dependencies_finish() {
    let mut scheduler = Scheduler::new(dev_graph());
    scheduler.step_request("default", 7);

    for task in ["clean-dev", "js-dev", "css-dev", "templates-dev"] {
        let step = scheduler.step_completion(task, TaskOutcome::Success);
        assert!(step.newly_resolved.is_empty());
        assert!(!step.run_just_finished);
    }

    let step = scheduler.step_completion("server-dev", TaskOutcome::Success);
    assert_eq!(step.newly_resolved, vec!["default".to_string()]);
    assert!(step.run_just_finished);
    assert!(scheduler.is_idle());

    let report = scheduler.report();
    assert!(report.is_success());
    assert_eq!(report.succeeded.len(), 6);
}

#[test]
fn failure_blocks_transitive_dependents() {
    let mut scheduler = Scheduler::new(dev_graph());
    scheduler.step_request("default", 1);
    scheduler.step_completion("clean-dev", TaskOutcome::Success);

    let step = scheduler.step_completion("templates-dev", TaskOutcome::Failed("boom".into()));
    assert_eq!(step.newly_failed, vec!["templates-dev".to_string()]);
    let blocked: HashSet<String> = step.newly_blocked.into_iter().collect();
    assert_eq!(
        blocked,
        HashSet::from(["server-dev".to_string(), "default".to_string()])
    );
    // js and css are still running.
    assert!(!step.run_just_finished);

    scheduler.step_completion("js-dev", TaskOutcome::Success);
    let step = scheduler.step_completion("css-dev", TaskOutcome::Success);
    assert!(step.run_just_finished);

    let report = scheduler.report();
    assert!(report.did_fail("templates-dev"));
    assert!(report.was_blocked("server-dev"));
    assert!(report.did_succeed("js-dev"));
}

#[test]
fn completion_of_task_not_running_is_ignored() {
    let mut scheduler = Scheduler::new(dev_graph());
    scheduler.step_request("default", 1);

    let step = scheduler.step_completion("js-dev", TaskOutcome::Success);
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(scheduler.run_state_of("js-dev"), Some(TaskRunState::Pending));
}

#[test]
fn a_new_run_does_not_inherit_previous_success() {
    let mut scheduler = Scheduler::new(dev_graph());
    scheduler.step_request("js-dev", 1);
    scheduler.step_completion("clean-dev", TaskOutcome::Success);
    let step = scheduler.step_completion("js-dev", TaskOutcome::Success);
    assert!(step.run_just_finished);

    let step = scheduler.step_request("js-dev", 2);
    assert_eq!(names(&step.newly_scheduled), vec!["clean-dev"]);
    assert_eq!(step.newly_scheduled[0].run_id, 2);
}

#[test]
fn abandon_marks_unfinished_tasks_incomplete_or_failed() {
    let mut scheduler = Scheduler::new(dev_graph());
    scheduler.step_request("default", 1);
    scheduler.abandon("shutdown requested");

    assert!(scheduler.is_idle());
    let report = scheduler.report();
    assert!(!report.is_success());
    assert!(report.did_fail("clean-dev"));
}

/// A random acyclic graph: task i may only depend on tasks 0..i.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<(String, Vec<String>, bool)>> {
    (1..=max_tasks).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n),
            proptest::collection::vec(any::<bool>(), n),
        )
            .prop_map(move |(raw_deps, bodies)| {
                raw_deps
                    .into_iter()
                    .zip(bodies)
                    .enumerate()
                    .map(|(i, (potential, has_body))| {
                        let deps: HashSet<usize> = if i == 0 {
                            HashSet::new()
                        } else {
                            potential.into_iter().map(|d| d % i).collect()
                        };
                        let mut deps: Vec<String> =
                            deps.into_iter().map(|d| format!("task_{d}")).collect();
                        deps.sort();
                        (format!("task_{i}"), deps, has_body)
                    })
                    .collect()
            })
    })
}

proptest! {
    #[test]
    fn every_run_terminates_and_respects_dependencies(
        entries in dag_strategy(10),
        request in 0..10usize,
        failing in proptest::collection::hash_set(0..10usize, 0..4),
    ) {
        let graph = Arc::new(DagGraph::from_edges(entries.clone()));
        let mut scheduler = Scheduler::new(Arc::clone(&graph));
        let target = format!("task_{}", request % entries.len());
        let failing: HashSet<String> = failing.into_iter().map(|i| format!("task_{i}")).collect();

        let mut done: HashSet<String> = HashSet::new();
        let step = scheduler.step_request(&target, 1);
        done.extend(step.newly_resolved.iter().cloned());
        let mut executing: Vec<String> = step.newly_scheduled.into_iter().map(|t| t.name).collect();
        let mut finished = step.run_just_finished;

        let mut steps = 0;
        while let Some(task) = executing.pop() {
            steps += 1;
            prop_assert!(steps < 1000);

            // Dependencies of a dispatched task have all succeeded.
            for dep in graph.dependencies_of(&task) {
                prop_assert!(done.contains(dep), "{task} dispatched before {dep}");
            }

            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed("injected".into())
            } else {
                TaskOutcome::Success
            };
            let succeeded = matches!(outcome, TaskOutcome::Success);
            let step = scheduler.step_completion(&task, outcome);
            if succeeded {
                done.insert(task);
            }
            done.extend(step.newly_resolved.iter().cloned());
            executing.extend(step.newly_scheduled.into_iter().map(|t| t.name));
            finished = finished || step.run_just_finished;
        }

        prop_assert!(finished);
        prop_assert!(scheduler.is_idle());

        let closure = graph.dependency_closure(&target);
        let report = scheduler.report();
        let accounted = report.succeeded.len() + report.failed.len() + report.blocked.len();
        prop_assert_eq!(accounted, closure.len());
        prop_assert!(report.incomplete.is_empty());
    }
}
