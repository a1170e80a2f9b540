// tests/style_pipeline.rs

use std::error::Error;
use std::sync::Arc;

use assetflow::config::VariantConfig;
use assetflow::pipeline::{AssetPipeline, PipelineRun, RunEnd, StylePipeline};
use assetflow::report::{ErrorReporter, ReportedError};
use assetflow::types::Variant;
use assetflow_test_utils::builders::{Project, ProjectBuilder};
use assetflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn pipeline(project: &Project) -> StylePipeline {
    StylePipeline::new(
        project.root(),
        project.path("assets/styles/app.scss"),
        vec!["assets/styles/**/*.{scss,sass,css}".to_string()],
    )
}

fn variant(project: &Project, variant: Variant) -> VariantConfig {
    VariantConfig::defaults(variant, &project.path("build"))
}

#[tokio::test]
async fn dev_build_writes_css_and_referenced_map() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::standard().build();
    let styles = pipeline(&project);

    let output = styles.build(&variant(&project, Variant::Dev), &[]).await?;
    assert_eq!(output.artifacts.len(), 2);

    let css = project.read("build/dev/assets/css/app.css");
    assert!(css.contains("color: #333"), "css: {css}");
    assert!(css.trim_end().ends_with("/*# sourceMappingURL=app.css.map */"));

    let map: serde_json::Value =
        serde_json::from_str(&project.read("build/dev/assets/css/app.css.map"))?;
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "app.css");
    assert_eq!(map["mappings"], "AAAA,CCAA");
    let sources: Vec<&str> = map["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert!(sources.contains(&"../../../../assets/styles/app.scss"), "{sources:?}");
    assert!(sources.contains(&"../../../../assets/styles/_vars.scss"), "{sources:?}");

    assert!(!project.exists("build/dev/assets/css/app.min.css"));
    Ok(())
}

#[tokio::test]
async fn dist_build_writes_only_the_compressed_artifact() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let styles = pipeline(&project);

    styles.build(&variant(&project, Variant::Dist), &[]).await?;

    let css = project.read("build/dist/assets/css/app.min.css");
    assert!(css.contains("body{color:#333}"), "css: {css}");
    assert!(!css.contains("sourceMappingURL"));
    assert!(!project.exists("build/dist/assets/css/app.css"));
    assert!(!project.exists("build/dist/assets/css/app.min.css.map"));
    Ok(())
}

#[tokio::test]
async fn dist_build_is_deterministic() -> TestResult {
    let project = ProjectBuilder::standard().build();
    let styles = pipeline(&project);
    let cfg = variant(&project, Variant::Dist);

    styles.build(&cfg, &[]).await?;
    let first = project.read_bytes("build/dist/assets/css/app.min.css");
    styles.build(&cfg, &[]).await?;
    let second = project.read_bytes("build/dist/assets/css/app.min.css");

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn sass_error_is_reported_with_location_and_keeps_previous_artifact() -> TestResult {
    init_tracing();
    let project = ProjectBuilder::standard().build();
    let styles: Arc<dyn AssetPipeline> = Arc::new(pipeline(&project));
    let cfg = variant(&project, Variant::Dev);
    let reporter = ErrorReporter::new(project.root());

    let end = with_timeout(
        PipelineRun::start(Arc::clone(&styles), cfg.clone(), Vec::new(), reporter.clone()).finish(),
    )
    .await;
    assert!(end.is_success());
    let good = project.read("build/dev/assets/css/app.css");

    project.write("assets/styles/app.scss", "body {\n  color: $missing;\n}\n");
    let end = with_timeout(
        PipelineRun::start(Arc::clone(&styles), cfg.clone(), Vec::new(), reporter.clone()).finish(),
    )
    .await;

    match end {
        RunEnd::Reported(ReportedError::SourceError {
            kind,
            file,
            line,
            column,
            description,
        }) => {
            assert_eq!(kind, "StyleError");
            assert_eq!(file, "assets/styles/app.scss");
            assert_eq!(line, 2);
            assert!(column >= 1);
            assert!(description.contains("Undefined variable"), "{description}");
        }
        other => panic!("expected a SourceError, got {other:?}"),
    }
    assert_eq!(project.read("build/dev/assets/css/app.css"), good);

    // Fixing the file rebuilds without recreating the pipeline.
    project.write("assets/styles/app.scss", "body {\n  color: red;\n}\n");
    let end = with_timeout(
        PipelineRun::start(Arc::clone(&styles), cfg, Vec::new(), reporter).finish(),
    )
    .await;
    assert!(end.is_success());
    assert!(project.read("build/dev/assets/css/app.css").contains("color: red"));
    Ok(())
}

#[tokio::test]
async fn missing_entry_is_a_toolchain_error() -> TestResult {
    let project = ProjectBuilder::new().build();
    let styles: Arc<dyn AssetPipeline> = Arc::new(pipeline(&project));

    let end = PipelineRun::start(
        styles,
        variant(&project, Variant::Dev),
        Vec::new(),
        ErrorReporter::new(project.root()),
    )
    .finish()
    .await;

    match end.reported() {
        Some(ReportedError::ToolchainError { kind, .. }) => assert_eq!(kind, "StyleError"),
        other => panic!("expected ToolchainError, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn tracks_files_in_the_inclusion_graph() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("assets/styles/_unused.scss", "$x: 1;\n")
        .build();
    let styles = pipeline(&project);

    // Before any build everything counts.
    assert!(styles.tracks("assets/styles/_unused.scss"));

    styles.build(&variant(&project, Variant::Dev), &[]).await?;
    assert!(styles.tracks("assets/styles/_vars.scss"));
    assert!(styles.tracks("assets/styles/app.scss"));
    assert!(!styles.tracks("assets/styles/_unused.scss"));
    Ok(())
}

#[tokio::test]
async fn tracks_partials_reached_through_parent_imports() -> TestResult {
    let project = ProjectBuilder::standard()
        .file("assets/styles/app.scss", "@import 'components/button';\n")
        .file(
            "assets/styles/components/_button.scss",
            "@import '../colors';\n.button { color: $accent; }\n",
        )
        .file("assets/styles/_colors.scss", "$accent: #f60;\n")
        .build();
    let styles = pipeline(&project);

    styles.build(&variant(&project, Variant::Dev), &[]).await?;
    assert!(project.read("build/dev/assets/css/app.css").contains("#f60"));
    assert!(styles.tracks("assets/styles/components/_button.scss"));
    assert!(styles.tracks("assets/styles/_colors.scss"));
    assert!(styles.tracks("assets/styles/./_colors.scss"));
    assert!(!styles.tracks("assets/styles/_vars.scss"));
    Ok(())
}
