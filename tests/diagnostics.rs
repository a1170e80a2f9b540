// tests/diagnostics.rs

use std::path::Path;

use assetflow::pipeline::{PipelineError, Stage};
use assetflow::report::diagnostics::{parse_esbuild, parse_go};
use assetflow::report::{ErrorReporter, RawFailure, ReportedError, SourceLocation};

const ESBUILD_STDERR: &str = "\
✘ [ERROR] Expected \";\" but found \"world\"

    assets/scripts/app.js:3:12:
      3 │ const hello world = 1;
        │             ^
        ╵             ;

1 error
";

#[test]
fn esbuild_block_yields_one_based_location() {
    let failure = parse_esbuild(ESBUILD_STDERR);

    let location = failure.location().expect("located");
    assert_eq!(location.file, Path::new("assets/scripts/app.js"));
    assert_eq!(location.line, 3);
    assert_eq!(location.column, 13);
    match failure {
        RawFailure::Located { description, .. } => {
            assert_eq!(description, "Expected \";\" but found \"world\"")
        }
        RawFailure::Opaque(_) => unreachable!(),
    }
}

#[test]
fn esbuild_legacy_single_line_form() {
    let failure = parse_esbuild("assets/scripts/util.js:10:0: error: Unexpected end of file\n");

    let location = failure.location().expect("located");
    assert_eq!(location.file, Path::new("assets/scripts/util.js"));
    assert_eq!((location.line, location.column), (10, 1));
}

#[test]
fn esbuild_header_without_location_is_opaque() {
    let failure = parse_esbuild("✘ [ERROR] Invalid target \"es1999\"\n");
    assert_eq!(failure, RawFailure::opaque("Invalid target \"es1999\""));
}

#[test]
fn go_diagnostic_keeps_column() {
    let stderr = "# example.com/app\n./app/server.go:12:5: undefined: hanlder\n";
    let failure = parse_go(stderr);

    let location = failure.location().expect("located");
    assert_eq!(location.file, Path::new("app/server.go"));
    assert_eq!((location.line, location.column), (12, 5));
}

#[test]
fn go_output_without_location_drops_package_headers() {
    let failure = parse_go("# example.com/app\ngo: cannot find main module\n");
    assert_eq!(failure, RawFailure::opaque("go: cannot find main module"));
}

#[test]
fn located_failure_becomes_source_error_with_relative_path() {
    let reporter = ErrorReporter::new("/work/site");
    let err = PipelineError::new(
        Stage::Transform,
        "StyleError",
        RawFailure::located(
            SourceLocation::new("/work/site/assets/styles/app.scss", 4, 9),
            "expected \";\".",
        ),
    );

    let reported = reporter.classify(&err);
    assert!(reported.is_source_error());
    assert_eq!(
        reported.to_string(),
        "StyleError: assets/styles/app.scss: Line 4 & Column 9: expected \";\"."
    );
}

#[test]
fn opaque_failure_becomes_toolchain_error_on_one_line() {
    let reporter = ErrorReporter::new("/work/site");
    let err = PipelineError::new(
        Stage::Toolchain,
        "ServerError",
        RawFailure::opaque("go: cannot find main module\n\nsee 'go help modules'"),
    );

    let reported = reporter.report("server", &err);
    assert_eq!(
        reported,
        ReportedError::ToolchainError {
            kind: "ServerError".to_string(),
            message: "go: cannot find main module | see 'go help modules'".to_string(),
        }
    );
    assert_eq!(reported.kind(), "ServerError");
}
