// tests/builtin_tasks.rs

use std::error::Error;
use std::sync::Arc;

use assetflow::errors::AssetflowError;
use assetflow::fs::RealFileSystem;
use assetflow::pipeline::server::SERVER_PROCESS;
use assetflow::tasks::TaskRunner;
use assetflow::tasks::builtin::{BuildContext, DEFAULT_TASK, Toolchains, builtin_registry, describe};
use assetflow::types::Variant;
use assetflow_test_utils::builders::{Project, ProjectBuilder, list_files};
use assetflow_test_utils::fakes::{FakeBundler, FakeServerToolchain};
use assetflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    ctx: Arc<BuildContext>,
    runner: TaskRunner,
    bundler: Arc<FakeBundler>,
}

fn harness(project: &Project, watch: bool) -> Result<Harness, Box<dyn Error>> {
    let (config, layout) = project.load();
    let bundler = Arc::new(FakeBundler::new());
    let toolchains = Toolchains {
        bundler: bundler.clone(),
        server: Arc::new(FakeServerToolchain::new()),
    };
    let ctx = BuildContext::new(config, layout, toolchains, Arc::new(RealFileSystem))?
        .with_watch(watch);
    let ctx = Arc::new(ctx);
    let runner = builtin_registry(Arc::clone(&ctx))?.into_runner()?;
    Ok(Harness {
        ctx,
        runner,
        bundler,
    })
}

#[test]
fn registry_exposes_every_builtin_task() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let (config, layout) = project.load();
    let toolchains = Toolchains {
        bundler: Arc::new(FakeBundler::new()),
        server: Arc::new(FakeServerToolchain::new()),
    };
    let ctx = Arc::new(BuildContext::new(config, layout, toolchains, Arc::new(RealFileSystem))?);
    let registry = builtin_registry(ctx)?;

    let mut names: Vec<&str> = registry.names().collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "clean",
            "clean-dev",
            "clean-dist",
            "css-dev",
            "css-dist",
            "default",
            "dev",
            "dist",
            "js-dev",
            "js-dist",
            "lint",
            "lint-dist",
            "server-dev",
            "server-dist",
            "templates-dev",
            "templates-dist",
        ]
    );
    assert_eq!(
        registry.get("server-dev").map(|t| t.deps.clone()),
        Some(vec!["clean-dev".to_string(), "templates-dev".to_string()])
    );
    assert!(registry.get(DEFAULT_TASK).is_some_and(|t| t.body.is_none()));
    Ok(())
}

#[tokio::test]
async fn dist_builds_every_asset_type() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::standard().build();
    let h = harness(&project, false)?;

    let report = with_timeout(h.runner.run("dist")?.wait()).await?;
    assert!(report.is_success(), "{report}");
    assert!(report.did_succeed("lint-dist"));

    let binary = format!("server{}", std::env::consts::EXE_SUFFIX);
    assert_eq!(
        list_files(&project.path("build/dist")),
        vec![
            "assets/css/app.min.css".to_string(),
            "assets/js/app.min.js".to_string(),
            binary,
            "templates/index.html.tmpl".to_string(),
            "templates/partials/nav.html.tmpl".to_string(),
        ]
    );
    assert!(h.bundler.requests().iter().all(|r| r.minify));
    Ok(())
}

#[tokio::test]
async fn lint_gate_blocks_dist_pipelines() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("assets/scripts/app.js", "import './util.js';\ndebugger;\n")
        .build();
    let h = harness(&project, false)?;

    let report = with_timeout(h.runner.run("dist")?.wait()).await?;
    assert!(!report.is_success());
    assert!(report.did_fail("lint-dist"));
    for task in ["js-dist", "css-dist", "templates-dist", "server-dist"] {
        assert!(report.was_blocked(task), "{task} should be blocked: {report}");
    }
    assert!(list_files(&project.path("build/dist")).is_empty());
    assert_eq!(h.bundler.calls(), 0);

    let (_, message) = &report.failed[0];
    assert!(message.contains("lint gate failed with 1 error(s)"), "{message}");
    Ok(())
}

#[tokio::test]
async fn disabled_lint_gate_is_advisory() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("assets/scripts/app.js", "debugger;\n")
        .config("[variants.dist]\nlint_gate = false\n")
        .build();
    let h = harness(&project, false)?;

    let report = with_timeout(h.runner.run("dist")?.wait()).await?;
    assert!(report.is_success(), "{report}");
    assert!(project.exists("build/dist/assets/js/app.min.js"));
    Ok(())
}

#[tokio::test]
async fn dist_pipeline_failure_fails_the_run() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("assets/scripts/util.js", "export const answer = @@error;\n")
        .build();
    let h = harness(&project, false)?;

    let report = with_timeout(h.runner.run("dist")?.wait()).await?;
    assert!(!report.is_success());
    assert!(report.did_fail("js-dist"));
    assert!(report.did_succeed("css-dist"));
    assert!(!project.exists("build/dist/assets/js/app.min.js"));

    let (_, message) = report
        .failed
        .iter()
        .find(|(task, _)| task == "js-dist")
        .expect("js-dist failure");
    assert!(
        message.contains("ScriptError: assets/scripts/util.js: Line 1 & Column 23"),
        "{message}"
    );
    Ok(())
}

#[tokio::test]
async fn default_task_without_watch_builds_dev_assets_once() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let h = harness(&project, false)?;

    let report = with_timeout(h.runner.run(DEFAULT_TASK)?.wait()).await?;
    assert!(report.is_success(), "{report}");

    assert!(project.exists("build/dev/assets/js/app.js"));
    assert!(project.exists("build/dev/assets/js/app.js.map"));
    assert!(project.exists("build/dev/assets/css/app.css"));
    assert!(project.exists("build/dev/assets/css/app.css.map"));
    assert!(project.exists("build/dev/templates/index.html.tmpl"));
    assert!(project.exists(&format!("build/dev/server{}", std::env::consts::EXE_SUFFIX)));

    assert!(h.ctx.sessions().is_empty());
    assert!(!h.ctx.supervisor().is_running(SERVER_PROCESS).await);
    assert!(!h.ctx.variant_config(Variant::Dev).run_after_build);
    h.ctx.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn dev_build_failure_is_absorbed() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("assets/scripts/app.js", "@@error\n")
        .build();
    let h = harness(&project, false)?;

    let report = with_timeout(h.runner.run("js-dev")?.wait()).await?;
    assert!(report.is_success(), "{report}");
    assert!(!project.exists("build/dev/assets/js/app.js"));
    Ok(())
}

#[tokio::test]
async fn failed_default_run_stops_sessions_it_started() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::new()
        .file("assets/scripts/app.js", "const greeting = 'hi';\n")
        .file("assets/styles/app.scss", "body { color: red; }\n")
        .file("app/server.go", "package main\n\nfunc main() {}\n")
        .build();
    let h = harness(&project, true)?;

    let report = with_timeout(h.runner.run(DEFAULT_TASK)?.wait()).await?;
    assert!(!report.is_success(), "{report}");
    assert!(report.did_fail("templates-dev"));
    let (_, reason) = report
        .failed
        .iter()
        .find(|(task, _)| task == "templates-dev")
        .expect("templates-dev failure");
    assert!(reason.contains("does not exist"), "{reason}");
    assert!(!h.ctx.sessions().is_empty());

    assert!(!h.ctx.settle(&report).await);
    assert!(h.ctx.sessions().is_empty());
    assert!(!h.ctx.supervisor().is_running(SERVER_PROCESS).await);
    Ok(())
}

#[tokio::test]
async fn successful_watch_run_settles_into_watching() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let h = harness(&project, true)?;

    let report = with_timeout(h.runner.run("css-dev")?.wait()).await?;
    assert!(h.ctx.settle(&report).await);
    assert_eq!(h.ctx.sessions().pipelines(), vec!["css".to_string()]);

    h.ctx.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn dev_task_with_watch_leaves_a_session_behind() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let h = harness(&project, true)?;

    let report = with_timeout(h.runner.run("css-dev")?.wait()).await?;
    assert!(report.is_success(), "{report}");
    assert_eq!(h.ctx.sessions().pipelines(), vec!["css".to_string()]);

    h.ctx.shutdown().await;
    assert!(h.ctx.sessions().is_empty());
    Ok(())
}

#[tokio::test]
async fn clean_removes_build_output_and_tolerates_missing_dirs() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("build/dev/stale.js", "old")
        .build();
    let h = harness(&project, false)?;

    let report = with_timeout(h.runner.run("clean")?.wait()).await?;
    assert!(report.is_success(), "{report}");
    assert!(!project.exists("build/dev"));
    assert!(!project.exists("build/dist"));
    Ok(())
}

#[tokio::test]
async fn unknown_task_is_rejected() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let h = harness(&project, false)?;

    let err = h.runner.run("deploy").unwrap_err();
    assert!(matches!(err, AssetflowError::TaskNotFound(ref t) if t == "deploy"));
    Ok(())
}

#[test]
fn describe_prints_order_and_variant_settings() -> TestResult {
    let project = ProjectBuilder::standard()
        .config("[variants.dev]\nsource_maps = false\n")
        .build();
    let (config, layout) = project.load();
    let toolchains = Toolchains {
        bundler: Arc::new(FakeBundler::new()),
        server: Arc::new(FakeServerToolchain::new()),
    };
    let ctx = Arc::new(BuildContext::new(config, layout, toolchains, Arc::new(RealFileSystem))?);
    let runner = builtin_registry(Arc::clone(&ctx))?.into_runner()?;

    let order = runner.graph().execution_order("dist");
    let mut out = Vec::new();
    describe(&ctx, &order, &mut out)?;
    let text = String::from_utf8(out)?;

    assert!(text.starts_with("assetflow dry-run\n"), "{text}");
    assert!(text.contains("execution order (7):"), "{text}");
    assert!(text.contains("  - lint-dist\n"));
    assert!(text.contains("variant dev:\n    destination: build/dev\n    source_maps: false\n"));
    assert!(text.contains("variant dist:\n    destination: build/dist\n"));
    assert!(text.contains("    environment: distribution\n"));
    Ok(())
}
