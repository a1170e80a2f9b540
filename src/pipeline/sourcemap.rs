// src/pipeline/sourcemap.rs

//! Companion source maps (revision 3).
//!
//! `grass` does not expose output spans, so style maps cannot map rules back
//! to their origin. They list every file of the inclusion graph with its
//! content embedded and carry one segment per source on the first generated
//! line, which is enough for devtools to link each file.

use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Serialize)]
struct SourceMapV3 {
    version: u8,
    file: String,
    sources: Vec<String>,
    #[serde(rename = "sourcesContent")]
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    mappings: String,
}

/// Serialise a map for `file` (the artifact name) covering `sources`.
///
/// Each source is `(absolute path, content)`; paths are written relative to
/// `out_dir`, the directory the map is written to.
pub fn build_map(
    file: &str,
    sources: &[(PathBuf, Option<String>)],
    root: &Path,
    out_dir: &Path,
) -> serde_json::Result<Vec<u8>> {
    let map = SourceMapV3 {
        version: 3,
        file: file.to_string(),
        sources: sources
            .iter()
            .map(|(path, _)| relative_source(root, out_dir, path))
            .collect(),
        sources_content: sources.iter().map(|(_, content)| content.clone()).collect(),
        names: Vec::new(),
        mappings: source_anchors(sources.len()),
    };
    serde_json::to_vec(&map)
}

/// Segments for generated line 0: column `i` maps to line 0, column 0 of
/// source `i`.
///
/// Fields are VLQ deltas, so after the first segment (`AAAA`) each one only
/// advances the generated column and the source index by one (`CCAA`).
fn source_anchors(count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let mut out = String::from("AAAA");
    for _ in 1..count {
        out.push_str(",CCAA");
    }
    out
}

/// Append the trailing reference comment to a stylesheet.
pub fn with_mapping_comment(css: &str, map_name: &str) -> String {
    let mut out = css.trim_end().to_string();
    out.push_str(&format!("\n/*# sourceMappingURL={map_name} */\n"));
    out
}

/// Path of `file` as seen from `out_dir`, when both live under `root`.
///
/// Falls back to the absolute path otherwise.
pub fn relative_source(root: &Path, out_dir: &Path, file: &Path) -> String {
    match (out_dir.strip_prefix(root), file.strip_prefix(root)) {
        (Ok(out_rel), Ok(file_rel)) => format!(
            "{}{}",
            "../".repeat(out_rel.components().count()),
            file_rel.to_string_lossy().replace('\\', "/")
        ),
        _ => file.to_string_lossy().replace('\\', "/"),
    }
}
