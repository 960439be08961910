//! Output formatting for check, test and amalgomate results.
//!
//! Issue lines go to stdout so they can be piped; summaries go to stderr
//! with colors.
//! - Text: one `Display` line per issue, no trailing blank line
//! - JSON: structured output for programmatic consumption

use std::io::{self, Write};
use std::path::Path;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::amalgomate::Manifest;
use crate::check::CheckResult;
use crate::gotest::TestReport;

/// Output format for `gokart check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Write every issue in `Display` form, one per line.
pub fn write_text<W: Write>(results: &[CheckResult], mut out: W) -> io::Result<()> {
    for result in results {
        for issue in &result.issues {
            writeln!(out, "{}", issue)?;
        }
    }
    out.flush()
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub root: String,
    pub passed: bool,
    pub checks: Vec<JsonCheck>,
}

#[derive(Serialize, Deserialize)]
pub struct JsonCheck {
    pub name: String,
    pub passed: bool,
    pub issues: Vec<JsonIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_packages: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct JsonIssue {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub path: String,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub line: u32,
    #[serde(skip_serializing_if = "is_zero", default)]
    pub column: u32,
    pub message: String,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

pub fn json_report(root: &Path, results: &[CheckResult]) -> JsonReport {
    let checks: Vec<JsonCheck> = results
        .iter()
        .map(|r| JsonCheck {
            name: r.check.clone(),
            passed: r.passed(),
            issues: r
                .issues
                .iter()
                .map(|i| JsonIssue {
                    path: i.path().to_string(),
                    line: i.line(),
                    column: i.column(),
                    message: i.message().to_string(),
                })
                .collect(),
            failed_packages: r.failed_packages.clone(),
        })
        .collect();
    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        root: root.display().to_string(),
        passed: checks.iter().all(|c| c.passed),
        checks,
    }
}

pub fn write_json<W: Write>(root: &Path, results: &[CheckResult], mut out: W) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&json_report(root, results))?;
    writeln!(out, "{}", json)?;
    Ok(())
}

// =============================================================================
// Summaries (stderr)
// =============================================================================

pub fn print_check_summary(results: &[CheckResult]) {
    for result in results {
        if result.passed() {
            eprintln!("  {} {}", "✓".green(), result.check);
        } else {
            let count = result.issues.len();
            eprintln!(
                "  {} {} {}",
                "✗".red(),
                result.check,
                format!("({} issue{})", count, if count == 1 { "" } else { "s" }).dimmed()
            );
        }
    }
}

pub fn print_test_summary(report: &TestReport) {
    if report.passed() {
        eprintln!("{}", "All packages passed".green());
        return;
    }
    eprintln!("{}", "Failed packages:".red().bold());
    for package in &report.failed {
        eprintln!("  {}", package);
    }
}

pub fn print_manifest(manifest: &Manifest) {
    eprintln!(
        "{} {} program(s) into {}",
        "Amalgomated".cyan().bold(),
        manifest.programs.len(),
        manifest.dispatch_file.display()
    );
    for (name, import) in &manifest.programs {
        eprintln!("  {:<20} {}", name, import.dimmed());
    }
}
