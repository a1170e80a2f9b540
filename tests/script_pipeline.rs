// tests/script_pipeline.rs

use std::error::Error;
use std::sync::Arc;

use assetflow::config::VariantConfig;
use assetflow::pipeline::bundler::metafile_inputs;
use assetflow::pipeline::{AssetPipeline, PipelineRun, ScriptPipeline, Stage};
use assetflow::report::{ErrorReporter, ReportedError};
use assetflow::types::Variant;
use assetflow_test_utils::builders::{Project, ProjectBuilder};
use assetflow_test_utils::fakes::FakeBundler;
use assetflow_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn pipeline(project: &Project, bundler: Arc<FakeBundler>) -> ScriptPipeline {
    ScriptPipeline::new(
        project.root(),
        project.path("assets/scripts/app.js"),
        "es2015",
        vec!["assets/scripts/**/*.js".to_string()],
        bundler,
    )
}

#[tokio::test]
async fn dev_build_writes_bundle_and_map() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::standard().build();
    let bundler = Arc::new(FakeBundler::new());
    let scripts = pipeline(&project, Arc::clone(&bundler));
    let cfg = VariantConfig::defaults(Variant::Dev, &project.path("build"));

    let output = scripts.build(&cfg, &[]).await?;
    assert_eq!(output.artifacts.len(), 2);

    let code = project.read("build/dev/assets/js/app.js");
    assert!(code.contains("const greeting = 'hi';"));
    assert!(code.contains("export const answer = 42;"));
    assert!(project.exists("build/dev/assets/js/app.js.map"));

    let request = &bundler.requests()[0];
    assert_eq!(request.output_name, "app.js");
    assert_eq!(request.target, "es2015");
    assert!(request.source_map);
    assert!(!request.minify);
    assert_eq!(request.out_dir, project.path("build/dev/assets/js"));
    Ok(())
}

#[tokio::test]
async fn dist_build_writes_minified_bundle_only() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let bundler = Arc::new(FakeBundler::new());
    let scripts = pipeline(&project, Arc::clone(&bundler));
    let cfg = VariantConfig::defaults(Variant::Dist, &project.path("build"));

    scripts.build(&cfg, &[]).await?;

    assert!(project.exists("build/dist/assets/js/app.min.js"));
    assert!(!project.exists("build/dist/assets/js/app.min.js.map"));
    assert!(!project.exists("build/dist/assets/js/app.js"));
    assert!(!project.read("build/dist/assets/js/app.min.js").contains('\n'));
    assert!(bundler.requests()[0].minify);
    Ok(())
}

#[tokio::test]
async fn module_graph_limits_tracked_files() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("assets/scripts/scratch.js", "console.log('unused');\n")
        .build();
    let scripts = pipeline(&project, Arc::new(FakeBundler::new()));

    assert!(scripts.tracks("assets/scripts/scratch.js"));

    let cfg = VariantConfig::defaults(Variant::Dev, &project.path("build"));
    scripts.build(&cfg, &[]).await?;

    assert_eq!(
        scripts.module_graph(),
        vec![
            "assets/scripts/app.js".to_string(),
            "assets/scripts/util.js".to_string()
        ]
    );
    assert!(scripts.tracks("assets/scripts/util.js"));
    assert!(!scripts.tracks("assets/scripts/scratch.js"));
    Ok(())
}

#[tokio::test]
async fn syntax_error_is_a_source_error_and_keeps_previous_bundle() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::standard().build();
    let scripts: Arc<dyn AssetPipeline> =
        Arc::new(pipeline(&project, Arc::new(FakeBundler::new())));
    let cfg = VariantConfig::defaults(Variant::Dev, &project.path("build"));
    let reporter = ErrorReporter::new(project.root());

    let end = PipelineRun::start(Arc::clone(&scripts), cfg.clone(), Vec::new(), reporter.clone())
        .finish()
        .await;
    assert!(end.is_success());
    let good = project.read("build/dev/assets/js/app.js");

    project.write("assets/scripts/util.js", "export const answer = 42;\n    @@error\n");
    let end = PipelineRun::start(scripts, cfg, Vec::new(), reporter).finish().await;

    let err = end.reported().expect("reported").clone();
    assert_eq!(
        err,
        ReportedError::SourceError {
            kind: "ScriptError".to_string(),
            file: "assets/scripts/util.js".to_string(),
            line: 2,
            column: 5,
            description: "Unexpected token".to_string(),
        }
    );
    assert_eq!(
        err.to_string(),
        "ScriptError: assets/scripts/util.js: Line 2 & Column 5: Unexpected token"
    );
    assert_eq!(project.read("build/dev/assets/js/app.js"), good);
    Ok(())
}

#[test]
fn metafile_inputs_are_sorted_relative_paths() {
    let raw = br#"{
        "inputs": {
            "assets/scripts/util.js": { "bytes": 20, "imports": [] },
            "assets/scripts/app.js": { "bytes": 40, "imports": [] }
        },
        "outputs": {}
    }"#;

    let inputs = metafile_inputs(raw).expect("valid metafile");
    assert_eq!(inputs, vec!["assets/scripts/app.js", "assets/scripts/util.js"]);
}

#[test]
fn malformed_metafile_is_a_resolve_failure() {
    let failure = metafile_inputs(b"not json").unwrap_err();
    assert_eq!(failure.stage, Stage::Resolve);
}
