// src/lint/mod.rs

//! Built-in script linter backing the `lint` and `lint-dist` tasks.
//!
//! Rules work line by line on the raw source. `//` line comments and the
//! contents of string literals are blanked before the token rules run, so
//! `"debugger"` in a string is not a finding.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::LintSection;
use crate::fs::FileSystem;
use crate::watch::patterns::{WatchProfile, collect_matching_files};

/// Configured level of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    Off,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl RuleLevel {
    fn severity(self) -> Option<Severity> {
        match self {
            RuleLevel::Off => None,
            RuleLevel::Warn => Some(Severity::Warning),
            RuleLevel::Error => Some(Severity::Error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One rule violation. `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}] {}",
            self.file.display(),
            self.line,
            self.column,
            self.severity,
            self.rule,
            self.message
        )
    }
}

/// Whether any finding is an error.
pub fn has_errors(findings: &[LintFinding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::Error)
}

static DEBUGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdebugger\b").expect("debugger regex"));
static CONSOLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bconsole\s*\.\s*[A-Za-z_$][\w$]*\s*\(").expect("console regex"));
static VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bvar\s+[A-Za-z_$\[{]").expect("var regex"));

/// Lints every script matched by a glob profile.
#[derive(Debug, Clone)]
pub struct Linter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    profile: WatchProfile,
    rules: LintSection,
}

impl Linter {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        profile: WatchProfile,
        rules: LintSection,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            profile,
            rules,
        }
    }

    /// Lint all matching files. Findings are ordered by file, then position.
    pub fn lint(&self) -> Result<Vec<LintFinding>> {
        let files = collect_matching_files(self.fs.as_ref(), &self.root, &self.profile)?;
        debug!(files = files.len(), root = %self.root.display(), "linting scripts");

        let mut findings = Vec::new();
        for file in files {
            let source = self.fs.read_to_string(&file)?;
            let rel = file.strip_prefix(&self.root).unwrap_or(&file);
            findings.extend(self.lint_source(rel, &source));
        }
        Ok(findings)
    }

    /// Lint one in-memory source attributed to `file`.
    pub fn lint_source(&self, file: &Path, source: &str) -> Vec<LintFinding> {
        let mut findings = Vec::new();
        let mut in_block_comment = false;

        for (idx, line) in source.lines().enumerate() {
            let line_no = (idx + 1) as u32;
            let mut push = |column: usize, rule: &'static str, level: RuleLevel, message: String| {
                if let Some(severity) = level.severity() {
                    findings.push(LintFinding {
                        file: file.to_path_buf(),
                        line: line_no,
                        column: column as u32,
                        rule,
                        severity,
                        message,
                    });
                }
            };

            let code = blank_non_code(line, &mut in_block_comment);

            if let Some(m) = DEBUGGER.find(&code) {
                push(
                    char_column(line, m.start()),
                    "no-debugger",
                    self.rules.no_debugger,
                    "unexpected 'debugger' statement".to_string(),
                );
            }
            if let Some(m) = CONSOLE.find(&code) {
                push(
                    char_column(line, m.start()),
                    "no-console",
                    self.rules.no_console,
                    "unexpected console call".to_string(),
                );
            }
            if let Some(m) = VAR.find(&code) {
                push(
                    char_column(line, m.start()),
                    "no-var",
                    self.rules.no_var,
                    "use 'let' or 'const' instead of 'var'".to_string(),
                );
            }

            let trimmed_len = line.trim_end_matches([' ', '\t']).len();
            if trimmed_len < line.len() {
                push(
                    char_column(line, trimmed_len),
                    "no-trailing-whitespace",
                    self.rules.no_trailing_whitespace,
                    "trailing whitespace".to_string(),
                );
            }

            let limit = self.rules.max_line_length_limit;
            let width = line.chars().count();
            if width > limit {
                push(
                    limit + 1,
                    "max-line-length",
                    self.rules.max_line_length,
                    format!("line is {width} characters long (limit {limit})"),
                );
            }
        }

        findings
    }
}

/// 1-based character column of byte offset `byte` in `line`.
fn char_column(line: &str, byte: usize) -> usize {
    line[..byte].chars().count() + 1
}

/// Replace comments and string literal contents with spaces, keeping byte
/// offsets stable. `in_block` carries `/* */` state across lines.
fn blank_non_code(line: &str, in_block: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if *in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_block = false;
                out.push_str("  ");
            } else {
                push_blank(&mut out, c);
            }
            continue;
        }

        if let Some(q) = quote {
            if c == '\\' {
                push_blank(&mut out, c);
                if let Some(escaped) = chars.next() {
                    push_blank(&mut out, escaped);
                }
            } else if c == q {
                quote = None;
                out.push(c);
            } else {
                push_blank(&mut out, c);
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                push_blank(&mut out, c);
                for rest in chars.by_ref() {
                    push_blank(&mut out, rest);
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                *in_block = true;
                out.push_str("  ");
            }
            _ => out.push(c),
        }
    }

    out
}

/// Blank a char without shifting byte offsets.
fn push_blank(out: &mut String, c: char) {
    for _ in 0..c.len_utf8() {
        out.push(' ');
    }
}

/// Log every finding at its severity and return the totals.
pub fn log_findings(findings: &[LintFinding]) -> (usize, usize) {
    let mut errors = 0;
    let mut warnings = 0;
    for finding in findings {
        match finding.severity {
            Severity::Error => {
                errors += 1;
                error!(rule = finding.rule, "{finding}");
            }
            Severity::Warning => {
                warnings += 1;
                warn!(rule = finding.rule, "{finding}");
            }
        }
    }
    info!(errors, warnings, "lint finished");
    (errors, warnings)
}
