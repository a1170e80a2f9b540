#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assetflow::config::{ConfigFile, ProjectLayout, load_or_default};
use tempfile::TempDir;

/// Builder for a throwaway project tree in a temp directory.
pub struct ProjectBuilder {
    files: Vec<(PathBuf, Vec<u8>)>,
    config: Option<String>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            config: None,
        }
    }

    /// Default project layout with one file per asset type.
    pub fn standard() -> Self {
        Self::new()
            .file("assets/scripts/app.js", "import './util.js';\nconst greeting = 'hi';\n")
            .file("assets/scripts/util.js", "export const answer = 42;\n")
            .file(
                "assets/styles/app.scss",
                "@use 'vars';\nbody { color: vars.$fg; }\n",
            )
            .file("assets/styles/_vars.scss", "$fg: #333;\n")
            .file("templates/index.html.tmpl", "<h1>{{ .Title }}</h1>\n")
            .file("templates/partials/nav.html.tmpl", "<nav></nav>\n")
            .file("app/server.go", "package main\n\nfunc main() {}\n")
    }

    pub fn file(mut self, rel: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((PathBuf::from(rel), contents.into()));
        self
    }

    /// Contents of `Assetflow.toml`.
    pub fn config(mut self, toml: &str) -> Self {
        self.config = Some(toml.to_string());
        self
    }

    pub fn build(self) -> Project {
        let dir = tempfile::tempdir().expect("create temp project dir");
        for (rel, contents) in &self.files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create fixture dir");
            }
            fs::write(&path, contents).expect("write fixture file");
        }
        if let Some(toml) = &self.config {
            fs::write(dir.path().join("Assetflow.toml"), toml).expect("write config");
        }
        Project { dir }
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A project on disk. Deleted when dropped.
pub struct Project {
    dir: TempDir,
}

impl Project {
    /// Canonical root, so paths match what the watcher reports.
    pub fn root(&self) -> PathBuf {
        self.dir
            .path()
            .canonicalize()
            .unwrap_or_else(|_| self.dir.path().to_path_buf())
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("Assetflow.toml")
    }

    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(path, contents).expect("write file");
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("remove file");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap_or_else(|e| panic!("reading {rel}: {e}"))
    }

    pub fn read_bytes(&self, rel: &str) -> Vec<u8> {
        fs::read(self.path(rel)).unwrap_or_else(|e| panic!("reading {rel}: {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Load the project's config (or defaults) and resolve the layout.
    pub fn load(&self) -> (ConfigFile, ProjectLayout) {
        load_or_default(self.config_path()).expect("load project config")
    }
}

/// Files below `dir`, relative to it, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(rel) = path.strip_prefix(dir) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    out.sort();
    out
}
