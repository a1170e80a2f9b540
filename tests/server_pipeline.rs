// tests/server_pipeline.rs

use std::error::Error;
use std::sync::Arc;

use assetflow::config::VariantConfig;
use assetflow::exec::ProcessSupervisor;
use assetflow::pipeline::server::SERVER_PROCESS;
use assetflow::pipeline::{AssetPipeline, LaunchSettings, PipelineRun, ServerPipeline};
use assetflow::report::{ErrorReporter, ReportedError};
use assetflow::types::Variant;
use assetflow_test_utils::builders::{Project, ProjectBuilder, list_files};
use assetflow_test_utils::fakes::FakeServerToolchain;

type TestResult = Result<(), Box<dyn Error>>;

fn launch() -> LaunchSettings {
    LaunchSettings {
        binary_name: "server".to_string(),
        env_var: "APP_ENV".to_string(),
        extra_env: vec![("PORT".to_string(), "8080".to_string())],
        args: Vec::new(),
    }
}

fn pipeline(
    project: &Project,
    toolchain: Arc<FakeServerToolchain>,
    supervisor: ProcessSupervisor,
) -> ServerPipeline {
    ServerPipeline::new(
        project.root(),
        project.path("app/server.go"),
        vec!["app/**/*.go".to_string()],
        launch(),
        toolchain,
        supervisor,
    )
}

#[tokio::test]
async fn builds_binary_into_variant_root_without_leftovers() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let toolchain = Arc::new(FakeServerToolchain::new());
    let server = pipeline(&project, Arc::clone(&toolchain), ProcessSupervisor::new());
    let cfg = VariantConfig::defaults(Variant::Dist, &project.path("build"));

    let output = server.build(&cfg, &[]).await?;

    let binary = format!("server{}", std::env::consts::EXE_SUFFIX);
    assert_eq!(output.artifacts, vec![project.path("build/dist").join(&binary)]);
    assert!(project.path("build/dist").join(&binary).is_file());
    assert_eq!(list_files(&project.path("build/dist")), vec![binary]);

    let request = &toolchain.requests()[0];
    assert_eq!(request.root, project.root());
    assert_eq!(request.entry, project.path("app/server.go"));
    Ok(())
}

#[tokio::test]
async fn environment_block_carries_the_variant_marker() {
    let project = ProjectBuilder::standard().build();
    let server = pipeline(
        &project,
        Arc::new(FakeServerToolchain::new()),
        ProcessSupervisor::new(),
    );

    let dev = VariantConfig::defaults(Variant::Dev, &project.path("build"));
    assert_eq!(
        server.environment(&dev),
        vec![
            ("APP_ENV".to_string(), "development".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ]
    );

    let dist = VariantConfig::defaults(Variant::Dist, &project.path("build"));
    assert_eq!(server.environment(&dist)[0].1, "distribution");
}

#[tokio::test]
async fn compile_error_is_reported_and_nothing_is_installed() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("app/server.go", "package main\n\nfunc main() { @@error }\n")
        .build();
    let server: Arc<dyn AssetPipeline> = Arc::new(pipeline(
        &project,
        Arc::new(FakeServerToolchain::new()),
        ProcessSupervisor::new(),
    ));
    let cfg = VariantConfig::defaults(Variant::Dev, &project.path("build"));

    let end = PipelineRun::start(server, cfg, Vec::new(), ErrorReporter::new(project.root()))
        .finish()
        .await;

    match end.reported() {
        Some(ReportedError::SourceError {
            kind, file, line, column, ..
        }) => {
            assert_eq!(kind, "ServerError");
            assert_eq!(file, "app/server.go");
            assert_eq!((*line, *column), (3, 15));
        }
        other => panic!("expected SourceError, got {other:?}"),
    }
    assert!(list_files(&project.path("build/dev")).is_empty());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn run_after_build_starts_a_supervised_process() -> TestResult {
    use std::os::unix::fs::PermissionsExt;

    let project = ProjectBuilder::standard().build();
    let supervisor = ProcessSupervisor::new();
    let server = pipeline(&project, Arc::new(FakeServerToolchain::new()), supervisor.clone());
    let mut cfg = VariantConfig::defaults(Variant::Dev, &project.path("build"));
    cfg.run_after_build = false;

    // First build installs the placeholder; make it a long-running script.
    server.build(&cfg, &[]).await?;
    let binary = project.path("build/dev/server");
    std::fs::write(&binary, "#!/bin/sh\nsleep 30\n")?;
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755))?;

    let spec = assetflow::exec::ProcessSpec {
        program: binary.clone(),
        args: Vec::new(),
        cwd: project.path("build/dev"),
        env: server.environment(&cfg),
    };
    supervisor.restart(SERVER_PROCESS, spec).await?;
    assert!(supervisor.is_running(SERVER_PROCESS).await);

    supervisor.stop_all().await;
    assert!(!supervisor.is_running(SERVER_PROCESS).await);
    Ok(())
}
