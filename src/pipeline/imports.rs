// src/pipeline/imports.rs

//! Sass inclusion graph.
//!
//! Follows `@import`, `@use` and `@forward` from an entry stylesheet using
//! Sass resolution rules (partials, implicit extensions, `_index` files).
//! The parsed import list of each file is cached and keyed by its
//! modification time, so unchanged files are not re-read on rebuild.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use tracing::trace;

use crate::watch::path_utils::normalize_lexically;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*@(?:import|use|forward)[ \t]+([^;\n]+)").expect("sass directive regex")
});

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("quoted string regex"));

const EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

#[derive(Debug, Clone)]
struct CachedImports {
    modified: SystemTime,
    imports: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ImportGraph {
    load_paths: Vec<PathBuf>,
    cache: HashMap<PathBuf, CachedImports>,
    /// Files reached by the last `resolve`.
    last: HashSet<PathBuf>,
}

impl ImportGraph {
    pub fn new(load_paths: Vec<PathBuf>) -> Self {
        Self {
            load_paths,
            ..Self::default()
        }
    }

    /// Every file reachable from `entry`, entry first, then breadth-first.
    ///
    /// Imports that cannot be resolved are skipped here; the compiler reports
    /// them with a proper location.
    pub fn resolve(&mut self, entry: &Path) -> io::Result<Vec<PathBuf>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let entry = normalize_lexically(entry);
        let mut queue = VecDeque::from([entry.clone()]);

        while let Some(file) = queue.pop_front() {
            if !seen.insert(file.clone()) {
                continue;
            }
            let imports = match self.imports_of(&file) {
                Ok(imports) => imports,
                Err(e) if file == entry => return Err(e),
                // A partial vanished between resolution and reading.
                Err(_) => continue,
            };
            order.push(file);
            queue.extend(imports);
        }

        self.last = order.iter().cloned().collect();
        Ok(order)
    }

    /// Whether `path` was part of the graph at the last `resolve`.
    pub fn contains(&self, path: &Path) -> bool {
        self.last.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    fn imports_of(&mut self, file: &Path) -> io::Result<Vec<PathBuf>> {
        let modified = fs::metadata(file)?.modified()?;

        if let Some(cached) = self.cache.get(file) {
            if cached.modified == modified {
                trace!(file = %file.display(), "import cache hit");
                return Ok(cached.imports.clone());
            }
        }

        let source = fs::read_to_string(file)?;
        let dir = file.parent().unwrap_or_else(|| Path::new("."));
        let imports: Vec<PathBuf> = parse_imports(&source)
            .iter()
            .filter_map(|spec| resolve_import(dir, spec, &self.load_paths))
            .collect();

        self.cache.insert(
            file.to_path_buf(),
            CachedImports {
                modified,
                imports: imports.clone(),
            },
        );
        Ok(imports)
    }
}

/// Import specifiers in `source`, skipping built-in modules, URLs and plain
/// CSS imports.
pub fn parse_imports(source: &str) -> Vec<String> {
    let mut specs = Vec::new();
    for caps in DIRECTIVE_RE.captures_iter(source) {
        let args = &caps[1];
        for quoted in QUOTED_RE.captures_iter(args) {
            let spec = quoted[1].trim();
            if is_loadable(spec) {
                specs.push(spec.to_string());
            }
        }
    }
    specs
}

fn is_loadable(spec: &str) -> bool {
    let remote = ["http://", "https://", "//"]
        .iter()
        .any(|prefix| spec.starts_with(prefix));
    // `@import "x.css"` stays a plain CSS import and is never loaded.
    !(spec.is_empty() || spec.starts_with("sass:") || remote || spec.ends_with(".css"))
}

/// Resolve `spec` relative to `dir`, then each load path.
///
/// The result is lexically normalized, so `../x` imports compare equal to
/// the same file reached any other way.
pub fn resolve_import(dir: &Path, spec: &str, load_paths: &[PathBuf]) -> Option<PathBuf> {
    std::iter::once(dir)
        .chain(load_paths.iter().map(PathBuf::as_path))
        .find_map(|base| candidates(base, spec).into_iter().find(|c| c.is_file()))
        .map(|found| normalize_lexically(&found))
}

/// Candidate files for `spec` under `base`, in Sass precedence order.
fn candidates(base: &Path, spec: &str) -> Vec<PathBuf> {
    let target = base.join(spec);
    let parent = target.parent().map(Path::to_path_buf).unwrap_or_default();
    let Some(stem) = target.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Vec::new();
    };

    let has_ext = Path::new(&stem)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e));

    if has_ext {
        return vec![parent.join(format!("_{stem}")), parent.join(&stem)];
    }

    let mut out = Vec::new();
    for ext in EXTENSIONS {
        out.push(parent.join(format!("_{stem}.{ext}")));
        out.push(parent.join(format!("{stem}.{ext}")));
    }
    for ext in EXTENSIONS {
        out.push(target.join(format!("_index.{ext}")));
        out.push(target.join(format!("index.{ext}")));
    }
    out
}
