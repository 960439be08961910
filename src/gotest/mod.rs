//! `go test` orchestration.
//!
//! Selects packages by tag, gives every package without tests a
//! placeholder test file so `go test` still compiles it, runs the tests
//! with aligned console output, and reports which packages failed.

pub mod junit;
pub mod output;
pub mod placeholder;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::check::PackageSelection;
use crate::config::{TestConfig, TAG_ALL, TAG_NONE};
use crate::error::Result;
use crate::filter::Exclude;
use crate::gosrc::BuildContext;
use crate::packages::{self, Package};
use crate::paths::{self, Workspace};
use crate::process;

pub use output::{AligningWriter, Tee};
pub use placeholder::{Placeholders, PLACEHOLDER_FILE};

/// Result of a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    /// Packages reported on `FAIL` lines.
    pub failed: Vec<String>,
    /// Exit status of `go test`.
    pub exit_code: i32,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs `go test` over a project root.
pub struct Orchestrator {
    root: PathBuf,
    config: TestConfig,
    exclude: Exclude,
    tag_matchers: BTreeMap<String, Exclude>,
    workspace: Option<Workspace>,
    build: BuildContext,
    go: PathBuf,
    tags: Vec<String>,
    junit_output: Option<PathBuf>,
    go_args: Vec<String>,
}

impl Orchestrator {
    /// Create an orchestrator for `root`. The configuration is validated
    /// here.
    pub fn new<P: AsRef<Path>>(root: P, config: &TestConfig) -> Result<Self> {
        config.validate()?;
        let root = paths::absolute(root.as_ref())?;
        let mut tag_matchers = BTreeMap::new();
        for (tag, matcher) in &config.tags {
            tag_matchers.insert(tag.clone(), matcher.compile()?);
        }
        let workspace = Workspace::discover(&root).ok();
        Ok(Self {
            root,
            config: config.clone(),
            exclude: config.exclude.compile()?,
            tag_matchers,
            workspace,
            build: BuildContext::default(),
            go: PathBuf::from("go"),
            tags: Vec::new(),
            junit_output: None,
            go_args: Vec::new(),
        })
    }

    /// Restrict the run to packages with these tags.
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn junit_output<P: Into<PathBuf>>(mut self, path: Option<P>) -> Self {
        self.junit_output = path.map(Into::into);
        self
    }

    /// Extra arguments placed before the package list.
    pub fn go_args(mut self, args: Vec<String>) -> Self {
        self.go_args = args;
        self
    }

    /// The go executable; defaults to `go` on `PATH`.
    pub fn go_command<P: Into<PathBuf>>(mut self, go: P) -> Self {
        self.go = go.into();
        self
    }

    pub fn build_context(mut self, ctx: BuildContext) -> Self {
        self.build = ctx;
        self
    }

    /// Packages selected by `selection` and the tag selector.
    pub fn packages(&self, selection: &PackageSelection) -> Result<Vec<Package>> {
        self.config.validate_selection(&self.tags)?;
        let found = match selection {
            PackageSelection::All => packages::enumerate(&self.root, &self.exclude, &self.build)?,
            PackageSelection::Explicit(dirs) => {
                let mut found = Vec::new();
                for dir in packages::filter_explicit(dirs, &self.exclude) {
                    let abs = if dir == "." { self.root.clone() } else { self.root.join(&dir) };
                    let name = packages::package_name_for_new_file(&abs, &self.build)?.unwrap_or_default();
                    found.push(Package::new(dir, name));
                }
                found
            }
        };
        Ok(found.into_iter().filter(|p| self.tag_selected(p)).collect())
    }

    fn tag_selected(&self, package: &Package) -> bool {
        if self.tags.is_empty() || self.tags.iter().any(|t| t == TAG_ALL) {
            return true;
        }
        let rel = Path::new(package.dir());
        let mut tagged = self.tag_matchers.iter().filter(|(_, m)| m.matches(rel)).map(|(t, _)| t);
        let wants_none = self.tags.iter().any(|t| t == TAG_NONE);
        match tagged.next() {
            None => wants_none,
            Some(first) => std::iter::once(first)
                .chain(tagged)
                .any(|t| self.tags.contains(t)),
        }
    }

    /// Run the tests, writing aligned output to `console`.
    pub fn run<W: Write>(&self, selection: &PackageSelection, console: W) -> Result<TestReport> {
        let selected = self.packages(selection)?;
        if selected.is_empty() {
            log::warn!("no packages to test");
            return Ok(TestReport {
                failed: Vec::new(),
                exit_code: 0,
            });
        }

        let placeholders = Placeholders::new();
        for package in &selected {
            let dir = package.abs_dir(&self.root);
            if package.name().is_empty() || packages::has_test_files(&dir)? {
                continue;
            }
            placeholders.write(&dir, package.name())?;
        }

        let mut cmd = Command::new(&self.go);
        cmd.arg("test");
        if self.junit_output.is_some() {
            cmd.arg("-v");
        }
        cmd.args(&self.go_args)
            .args(selected.iter().map(Package::arg))
            .current_dir(&self.root);

        let width = selected
            .iter()
            .map(|p| self.display_name(p).len())
            .max()
            .unwrap_or(0);
        let mut raw = Vec::new();
        let mut tee = Tee {
            a: AligningWriter::new(console, width),
            b: &mut raw,
        };
        let exit_code = process::stream_combined(cmd, "go test", &mut tee)?;
        let failed = tee.a.finish()?;

        if let Some(path) = &self.junit_output {
            junit::write_file(path, &String::from_utf8_lossy(&raw))?;
        }
        placeholders.cleanup();
        log::debug!("go test exited {}; {} package(s) failed", exit_code, failed.len());
        Ok(TestReport { failed, exit_code })
    }

    /// The package name `go test` prints: the import path when known.
    fn display_name(&self, package: &Package) -> String {
        self.workspace
            .as_ref()
            .and_then(|ws| ws.to_import_path(package.abs_dir(&self.root)).ok())
            .unwrap_or_else(|| package.arg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExcludeConfig;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "go.mod", "module example.com/proj\n");
        write(root, "api/api.go", "package api\n");
        write(root, "api/api_test.go", "package api\n");
        write(root, "db/db.go", "package db\n");
        write(root, "tools/gen/gen.go", "package main\n");
        temp
    }

    fn config() -> TestConfig {
        let mut config = TestConfig::default();
        config.tags.insert(
            "integration".to_string(),
            ExcludeConfig {
                names: vec!["db".to_string()],
                paths: Vec::new(),
            },
        );
        config.tags.insert(
            "tools".to_string(),
            ExcludeConfig {
                names: Vec::new(),
                paths: vec!["tools".to_string()],
            },
        );
        config
    }

    fn dirs(orchestrator: &Orchestrator) -> Vec<String> {
        orchestrator
            .packages(&PackageSelection::All)
            .unwrap()
            .iter()
            .map(|p| p.dir().to_string())
            .collect()
    }

    #[test]
    fn test_tag_selection() {
        let temp = project();
        let orch = Orchestrator::new(temp.path(), &config())
            .unwrap()
            .build_context(BuildContext::new("linux", "amd64"));
        assert_eq!(dirs(&orch), vec!["api", "db", "tools/gen"]);

        let orch = orch.tags(vec!["integration".to_string()]);
        assert_eq!(dirs(&orch), vec!["db"]);

        let orch = orch.tags(vec![TAG_NONE.to_string()]);
        assert_eq!(dirs(&orch), vec!["api"]);

        let orch = orch.tags(vec![TAG_NONE.to_string(), "tools".to_string()]);
        assert_eq!(dirs(&orch), vec!["api", "tools/gen"]);
    }

    #[test]
    fn test_unknown_tag() {
        let temp = project();
        let orch = Orchestrator::new(temp.path(), &config())
            .unwrap()
            .tags(vec!["nightly".to_string()]);
        assert!(orch.packages(&PackageSelection::All).is_err());
    }

    #[test]
    fn test_display_name_uses_import_path() {
        let temp = project();
        let orch = Orchestrator::new(temp.path(), &TestConfig::default()).unwrap();
        let name = orch.display_name(&Package::new("tools/gen", "main"));
        assert_eq!(name, "example.com/proj/tools/gen");
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial]
    fn test_run_writes_and_removes_placeholders() {
        use std::os::unix::fs::PermissionsExt;

        let temp = project();
        let root = temp.path();
        let log = root.join("seen.txt");
        let go = root.join("fake-go");
        write(
            root,
            "fake-go",
            &format!(
                "#!/bin/sh\nls db tools/gen > {}\nprintf 'ok\\texample.com/proj/api\\t0.01s\\nFAIL\\texample.com/proj/db\\t0.02s\\n'\nexit 1\n",
                log.display()
            ),
        );
        fs::set_permissions(&go, fs::Permissions::from_mode(0o755)).unwrap();

        let orch = Orchestrator::new(root, &TestConfig::default())
            .unwrap()
            .build_context(BuildContext::new("linux", "amd64"))
            .go_command(&go);
        let mut console = Vec::new();
        let report = orch.run(&PackageSelection::All, &mut console).unwrap();

        assert_eq!(report.failed, vec!["example.com/proj/db".to_string()]);
        assert_eq!(report.exit_code, 1);
        assert!(!report.passed());

        let seen = fs::read_to_string(&log).unwrap();
        assert_eq!(seen.matches(PLACEHOLDER_FILE).count(), 2);
        assert!(!root.join("db").join(PLACEHOLDER_FILE).exists());
        assert!(!root.join("tools/gen").join(PLACEHOLDER_FILE).exists());
        assert!(!root.join("api").join(PLACEHOLDER_FILE).exists());

        let console = String::from_utf8(console).unwrap();
        assert!(console.contains("ok\texample.com/proj/api      \t0.01s"));
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial]
    fn test_build_failure_fails_the_run() {
        use std::os::unix::fs::PermissionsExt;

        let temp = project();
        let root = temp.path();
        let go = root.join("fake-go");
        write(
            root,
            "fake-go",
            "#!/bin/sh\nprintf '# example.com/proj/api\\napi/api.go:3:1: syntax error\\nFAIL\\texample.com/proj/api [build failed]\\nFAIL\\n'\nexit 2\n",
        );
        fs::set_permissions(&go, fs::Permissions::from_mode(0o755)).unwrap();

        let orch = Orchestrator::new(root, &TestConfig::default())
            .unwrap()
            .build_context(BuildContext::new("linux", "amd64"))
            .go_command(&go);
        let mut console = Vec::new();
        let report = orch.run(&PackageSelection::All, &mut console).unwrap();

        assert_eq!(report.failed, vec!["example.com/proj/api".to_string()]);
        assert!(!report.passed());
        let console = String::from_utf8(console).unwrap();
        assert!(console.contains("FAIL\texample.com/proj/api      \t[build failed]"), "{}", console);
    }
}
