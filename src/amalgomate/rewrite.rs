//! Source rewriting for amalgomated trees.
//!
//! A copied file goes through one pass of byte-range edits (import paths,
//! verification comments, `package main` and `func main`), then its import
//! blocks are regrouped. The result is re-parsed; a rewrite that breaks a
//! file that parsed cleanly is an error.

use std::fs;
use std::ops::Range;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::gosrc::imports::{apply_edits, regroup};
use crate::gosrc::{FileSummary, GoFile};
use crate::paths::{join_import, strip_import_prefix};

use super::{ENTRY_ROUTINE, PACKAGE_NAME};

lazy_static! {
    /// `// import "path"` and `/* import "path" */` verification comments.
    static ref IMPORT_COMMENT: Regex = Regex::new(r#"^(//|/\*)\s*import\s+""#).unwrap();
}

/// How one project's files are rewritten.
#[derive(Debug, Clone)]
pub struct RewriteRules {
    /// Import path the project was copied from.
    pub from_prefix: String,
    /// Import path the project was copied to.
    pub to_prefix: String,
    /// Import path whose subtree groups as workspace-local.
    pub local_prefix: String,
    /// Replacement for `"flag"` imports, when the flag package is vendored.
    pub flag_path: Option<String>,
}

impl RewriteRules {
    fn rewrite_path(&self, path: &str) -> Option<String> {
        if strip_import_prefix(path, &self.to_prefix).is_some() {
            return None;
        }
        if path == "flag" {
            return self.flag_path.clone();
        }
        strip_import_prefix(path, &self.from_prefix).map(|rest| join_import(&self.to_prefix, rest))
    }
}

/// Rewrite Go source text.
pub fn rewrite_source(path: &Path, source: String, rules: &RewriteRules) -> Result<String> {
    let file = GoFile::parse(path, source)?;
    let parsed_cleanly = !file.has_errors();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    let imports = file.imports()?;
    for spec in &imports {
        if let Some(new_path) = rules.rewrite_path(&spec.path) {
            edits.push((spec.path_span.bytes.clone(), format!("\"{}\"", new_path)));
        }
    }

    let package = file.package()?;
    let anchor_rows: Vec<(usize, usize)> = package
        .iter()
        .map(|p| (p.clause_span.end_row, p.clause_span.bytes.end))
        .chain(imports.iter().map(|s| (s.spec_span.end_row, s.spec_span.bytes.end)))
        .collect();
    for comment in file.comments() {
        let follows_anchor = anchor_rows
            .iter()
            .any(|(row, end)| comment.span.start_row == *row && comment.span.bytes.start >= *end);
        if follows_anchor && IMPORT_COMMENT.is_match(&comment.text) {
            let start = leading_blank_start(file.source(), comment.span.bytes.start);
            edits.push((start..comment.span.bytes.end, String::new()));
        }
    }

    if let Some(pkg) = &package {
        if pkg.name == "main" {
            edits.push((pkg.name_span.bytes.clone(), PACKAGE_NAME.to_string()));
            if let Some(span) = file.entry_function("main") {
                edits.push((span.bytes, ENTRY_ROUTINE.to_string()));
            }
        }
    }

    let edited = apply_edits(file.source(), edits);
    let edited = GoFile::parse(path, edited)?;
    let regrouped = regroup(&edited, &rules.local_prefix)?;

    let result = GoFile::parse(path, regrouped)?;
    if parsed_cleanly && result.has_errors() {
        return Err(Error::rewrite(path, "rewritten source does not parse"));
    }
    Ok(result.into_source())
}

/// Rewrite a file in place and summarize the result.
pub fn rewrite_file(path: &Path, rules: &RewriteRules) -> Result<FileSummary> {
    let source = fs::read_to_string(path)?;
    let rewritten = rewrite_source(path, source.clone(), rules)?;
    if rewritten != source {
        fs::write(path, &rewritten)?;
        log::debug!("rewrote {}", path.display());
    }
    GoFile::parse(path, rewritten)?.summary()
}

/// Start of the run of spaces and tabs ending at `pos`.
fn leading_blank_start(source: &str, pos: usize) -> usize {
    let bytes = source.as_bytes();
    let mut start = pos;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    start
}
