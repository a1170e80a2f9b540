// tests/runtime_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use assetflow::dag::{DagGraph, Scheduler};
use assetflow::engine::{CoreCommand, CoreRuntime, Runtime, RuntimeEvent, TaskOutcome};
use assetflow_test_utils::fake_executor::FakeExecutor;
use assetflow_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// clean -> js -> bundle (bodiless)
fn chain() -> Scheduler {
    let graph = DagGraph::from_edges(vec![
        ("clean", vec![], true),
        ("js", vec!["clean"], true),
        ("bundle", vec!["js"], false),
    ]);
    Scheduler::new(Arc::new(graph))
}

#[test]
fn core_runtime_emits_dispatch_commands_and_stops_when_done() {
    let mut core = CoreRuntime::new(chain(), 3);

    let step = core.step(RuntimeEvent::TaskRequested {
        task: "bundle".to_string(),
    });
    assert!(step.keep_running);
    match step.commands.as_slice() {
        [CoreCommand::DispatchTasks(tasks)] => {
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].name, "clean");
            assert_eq!(tasks[0].run_id, 3);
        }
        other => panic!("unexpected commands: {other:?}"),
    }

    let step = core.step(RuntimeEvent::TaskCompleted {
        task: "clean".to_string(),
        outcome: TaskOutcome::Success,
    });
    assert!(step.keep_running);

    let step = core.step(RuntimeEvent::TaskCompleted {
        task: "js".to_string(),
        outcome: TaskOutcome::Success,
    });
    assert!(!step.keep_running);
    assert!(core.is_idle());
    assert!(core.report().did_succeed("bundle"));
}

#[test]
fn shutdown_abandons_the_run() {
    let mut core = CoreRuntime::new(chain(), 1);
    core.step(RuntimeEvent::TaskRequested {
        task: "bundle".to_string(),
    });

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);
    assert!(!core.report().is_success());
}

#[tokio::test]
async fn runtime_with_fake_executor_runs_simple_chain() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), Arc::clone(&executed));

    rt_tx
        .send(RuntimeEvent::TaskRequested {
            task: "bundle".to_string(),
        })
        .await?;

    let runtime = Runtime::new(CoreRuntime::new(chain(), 1), rt_rx, executor);

    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert!(report.is_success(), "{report}");
    assert_eq!(
        *executed.lock().unwrap(),
        vec!["clean".to_string(), "js".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn runtime_reports_failure_and_skips_dependents() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), Arc::clone(&executed)).failing("clean");

    rt_tx
        .send(RuntimeEvent::TaskRequested {
            task: "bundle".to_string(),
        })
        .await?;

    let runtime = Runtime::new(CoreRuntime::new(chain(), 1), rt_rx, executor);
    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert!(report.did_fail("clean"));
    assert!(report.was_blocked("js"));
    assert!(report.was_blocked("bundle"));
    assert_eq!(*executed.lock().unwrap(), vec!["clean".to_string()]);
    Ok(())
}
