// src/report/diagnostics.rs

//! Extract source locations from external tool output.
//!
//! Supported shapes:
//! - esbuild: a `✘ [ERROR] <message>` header followed by an indented
//!   `<file>:<line>:<col>:` line.
//! - esbuild (legacy): `<file>:<line>:<col>: error: <message>`.
//! - Go: `<file>.go:<line>:<col>: <message>`.
//!
//! esbuild columns are zero-based; every location returned here is 1-based.

use std::sync::LazyLock;

use regex::Regex;

use crate::report::{RawFailure, SourceLocation};

static ESBUILD_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:✘\s*)?\[ERROR\]\s*(?P<msg>.+?)\s*$").expect("esbuild header regex")
});

static ESBUILD_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+):\s*$")
        .expect("esbuild location regex")
});

static ESBUILD_LEGACY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+): error: (?P<msg>.+)$")
        .expect("esbuild legacy regex")
});

static GO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^\s:#][^:]*\.go):(?P<line>\d+)(?::(?P<col>\d+))?: (?P<msg>.+)$")
        .expect("go diagnostic regex")
});

/// Parse bundler stderr into a failure, located when possible.
pub fn parse_esbuild(stderr: &str) -> RawFailure {
    let lines: Vec<&str> = stderr.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = ESBUILD_HEADER_RE.captures(line) {
            let message = caps["msg"].to_string();
            let location = lines[idx + 1..]
                .iter()
                .take_while(|l| !ESBUILD_HEADER_RE.is_match(l))
                .find_map(|l| ESBUILD_LOCATION_RE.captures(l))
                .and_then(|c| location_from(&c["file"], &c["line"], Some(&c["col"]), 1));

            return match location {
                Some(location) => RawFailure::located(location, message),
                None => RawFailure::opaque(message),
            };
        }

        if let Some(caps) = ESBUILD_LEGACY_RE.captures(line.trim_end()) {
            if let Some(location) = location_from(&caps["file"], &caps["line"], Some(&caps["col"]), 1)
            {
                return RawFailure::located(location, &caps["msg"]);
            }
        }
    }

    RawFailure::opaque(opaque_message(stderr))
}

/// Parse Go toolchain stderr into a failure, located when possible.
pub fn parse_go(stderr: &str) -> RawFailure {
    for line in stderr.lines() {
        if let Some(caps) = GO_RE.captures(line.trim_end()) {
            let col = caps.name("col").map(|m| m.as_str());
            if let Some(location) = location_from(&caps["file"], &caps["line"], col, 0) {
                return RawFailure::located(location, &caps["msg"]);
            }
        }
    }

    RawFailure::opaque(opaque_message(stderr))
}

fn location_from(file: &str, line: &str, col: Option<&str>, col_offset: u32) -> Option<SourceLocation> {
    let line: u32 = line.parse().ok()?;
    let column: u32 = match col {
        Some(c) => c.parse::<u32>().ok()? + col_offset,
        None => 1,
    };
    let file = file.trim().trim_start_matches("./");
    Some(SourceLocation::new(file, line, column.max(1)))
}

/// Non-empty lines of `stderr`, dropping Go's `# package` headers.
fn opaque_message(stderr: &str) -> String {
    let message = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    if message.is_empty() {
        "tool exited with an error and no output".to_string()
    } else {
        message
    }
}
