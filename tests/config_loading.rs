// tests/config_loading.rs

use std::error::Error;
use std::path::PathBuf;

use assetflow::config::{
    ConfigFile, ProjectLayout, RawConfigFile, load_and_validate, load_or_default,
};
use assetflow::errors::AssetflowError;
use assetflow::lint::RuleLevel;
use assetflow::types::{RebuildBehaviour, Variant};
use assetflow_test_utils::builders::ProjectBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn parse(toml_src: &str) -> Result<ConfigFile, AssetflowError> {
    let raw: RawConfigFile = toml::from_str(toml_src)?;
    ConfigFile::try_from(raw)
}

#[test]
fn missing_file_means_defaults() -> TestResult {
    let project = ProjectBuilder::new().build();
    let (config, layout) = load_or_default(project.config_path())?;

    assert_eq!(config.paths.scripts_entry, PathBuf::from("assets/scripts/app.js"));
    assert_eq!(config.watch.triggered_while_running_behaviour, RebuildBehaviour::Queue);
    assert_eq!(config.watch.debounce_ms, 50);
    assert_eq!(config.server.env_var, "APP_ENV");
    assert_eq!(config.lint.no_debugger, RuleLevel::Error);
    assert_eq!(config.lint.no_var, RuleLevel::Off);

    assert_eq!(layout.root, project.root());
    assert_eq!(layout.build_root, project.root().join("build"));
    assert_eq!(layout.styles_entry, project.root().join("assets/styles/app.scss"));
    Ok(())
}

#[test]
fn file_values_override_defaults() -> TestResult {
    let project = ProjectBuilder::new()
        .config(
            r#"
[paths]
build = "out"
scripts_entry = "web/main.js"
scripts_watch = ["web/**/*.js"]

[toolchain]
bundler = "/opt/esbuild"
bundler_target = "es2020"

[server]
env_var = "MODE"
binary_name = "site"
env = { PORT = "8080" }

[watch]
triggered_while_running_behaviour = "drop"
debounce_ms = 0

[lint]
no_console = "error"
no_var = "warning"
max_line_length_limit = 80

[variants.dev]
run_after_build = false
"#,
        )
        .build();

    let config = load_and_validate(project.config_path())?;
    assert_eq!(config.paths.build, PathBuf::from("out"));
    assert_eq!(config.toolchain.bundler, "/opt/esbuild");
    assert_eq!(config.toolchain.bundler_target, "es2020");
    assert_eq!(config.toolchain.go, "go");
    assert_eq!(config.server.env.get("PORT").map(String::as_str), Some("8080"));
    assert_eq!(config.watch.triggered_while_running_behaviour, RebuildBehaviour::Drop);
    assert_eq!(config.lint.no_console, RuleLevel::Error);
    assert_eq!(config.lint.no_var, RuleLevel::Warn);
    assert_eq!(config.lint.max_line_length_limit, 80);
    assert_eq!(config.overrides_for(Variant::Dev).run_after_build, Some(false));
    assert_eq!(config.overrides_for(Variant::Dist).run_after_build, None);
    Ok(())
}

#[test]
fn layout_is_anchored_at_the_config_directory() -> TestResult {
    let project = ProjectBuilder::new()
        .config("[paths]\nroot = \"site\"\ntemplates_dir = \"views\"\n")
        .build();

    let (config, layout) = load_or_default(project.config_path())?;
    let root = project.root().join("site");
    assert_eq!(layout.root, root);
    assert_eq!(layout.templates_dir, root.join("views"));
    assert_eq!(layout.templates_watch(), vec!["views/**/*.html.tmpl".to_string()]);

    let dev = layout.variant_config(&config, Variant::Dev);
    assert_eq!(dev.destination, root.join("build").join("dev"));
    Ok(())
}

#[test]
fn relative_destination_override_is_resolved_against_root() -> TestResult {
    let config = parse("[variants.dist]\ndestination = \"public\"\n")?;
    let layout = ProjectLayout::resolve(&PathBuf::from("/srv/app"), &config);

    let dist = layout.variant_config(&config, Variant::Dist);
    assert_eq!(dist.destination, PathBuf::from("/srv/app/public"));
    assert!(dist.compression);
    Ok(())
}

#[test]
fn invalid_glob_is_rejected() {
    let err = parse("[paths]\nstyles_watch = [\"assets/[styles\"]\n").unwrap_err();
    assert!(matches!(err, AssetflowError::ConfigError(_)), "got {err:?}");
}

#[test]
fn empty_entry_is_rejected() {
    let err = parse("[paths]\nscripts_entry = \"\"\n").unwrap_err();
    match err {
        AssetflowError::ConfigError(msg) => assert!(msg.contains("scripts_entry")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_severity_fails_deserialization() {
    let err = parse("[lint]\nno_console = \"loud\"\n").unwrap_err();
    assert!(matches!(err, AssetflowError::TomlError(_)), "got {err:?}");
}

#[test]
fn unknown_behaviour_fails_deserialization() {
    let err = parse("[watch]\ntriggered_while_running_behaviour = \"cancel\"\n").unwrap_err();
    assert!(matches!(err, AssetflowError::TomlError(_)), "got {err:?}");
}

#[test]
fn demo_config_loads() -> TestResult {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/Assetflow.toml");
    let config = load_and_validate(&path)?;

    assert_eq!(config.paths.exclude, vec!["**/*.swp", "**/node_modules/**"]);
    assert_eq!(config.server.env.get("PORT").map(String::as_str), Some("8080"));
    assert_eq!(config.lint.max_line_length_limit, 120);

    let layout = ProjectLayout::resolve(path.parent().unwrap_or(&path), &config);
    let dist = layout.variant_config(&config, Variant::Dist);
    assert!(dist.lint_gate && dist.compression && !dist.source_maps);
    assert_eq!(dist.destination, layout.root.join("build/dist"));
    Ok(())
}
