//! Runs checks over a project and collects their issues.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use rayon::prelude::*;

use crate::config::CheckConfig;
use crate::error::{Error, Result};
use crate::filter::{self, BoxFilter, Exclude};
use crate::gosrc::BuildContext;
use crate::issue::{parse_output, Issue, PathResolver};
use crate::packages::{self, package_arg};
use crate::paths::Workspace;
use crate::process;

use super::{definition, AllForm, CheckDefinition, Invocation, Program, DEFINITIONS};

/// Which packages a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSelection {
    All,
    /// Root-relative directories, in the caller's order.
    Explicit(Vec<String>),
}

impl PackageSelection {
    /// `All` for an empty list.
    pub fn from_args(args: &[String]) -> Self {
        if args.is_empty() {
            PackageSelection::All
        } else {
            PackageSelection::Explicit(args.to_vec())
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub check: String,
    pub issues: Vec<Issue>,
    /// Directories that produced at least one issue, in first-seen order.
    pub failed_packages: Vec<String>,
}

impl CheckResult {
    fn new(check: &str, issues: Vec<Issue>) -> Self {
        let mut seen = HashSet::new();
        let failed_packages = issues
            .iter()
            .filter_map(Issue::dir)
            .filter(|d| seen.insert(d.clone()))
            .collect();
        Self {
            check: check.to_string(),
            issues,
            failed_packages,
        }
    }

    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check runner bound to one project root.
pub struct Driver {
    root: PathBuf,
    config: CheckConfig,
    exclude: Exclude,
    workspace: Option<Workspace>,
    build: BuildContext,
    self_exe: Option<PathBuf>,
    parallel: bool,
}

impl Driver {
    /// Create a driver for `root`. The configuration is validated here.
    pub fn new<P: AsRef<Path>>(root: P, config: CheckConfig) -> Result<Self> {
        config.validate()?;
        let root = crate::paths::absolute(root.as_ref())?;
        let exclude = config.exclude.compile()?;
        let workspace = Workspace::discover(&root).ok();
        Ok(Self {
            root,
            config,
            exclude,
            workspace,
            build: BuildContext::default(),
            self_exe: None,
            parallel: false,
        })
    }

    /// Executable that serves built-in checks; defaults to the running one.
    pub fn self_exe<P: Into<PathBuf>>(mut self, exe: P) -> Self {
        self.self_exe = Some(exe.into());
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn build_context(mut self, ctx: BuildContext) -> Self {
        self.build = ctx;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Definitions to run: `only` when given, else every check, minus
    /// skipped ones.
    pub fn selected(&self, only: &[String]) -> Result<Vec<&'static CheckDefinition>> {
        for name in only {
            if definition(name).is_none() {
                return Err(Error::config(format!("unknown check {:?}", name)));
            }
        }
        Ok(DEFINITIONS
            .iter()
            .filter(|d| only.is_empty() || only.iter().any(|n| n == d.name))
            .filter(|d| !self.config.settings(d.name).skip)
            .collect())
    }

    /// Run the selected checks. Results come back in run order whether or
    /// not they executed in parallel.
    pub fn run(&self, only: &[String], selection: &PackageSelection) -> Result<Vec<CheckResult>> {
        let defs = self.selected(only)?;
        if self.parallel {
            defs.par_iter()
                .map(|def| self.run_check(def, selection))
                .collect()
        } else {
            defs.iter().map(|def| self.run_check(def, selection)).collect()
        }
    }

    /// Run one check.
    pub fn run_check(&self, def: &CheckDefinition, selection: &PackageSelection) -> Result<CheckResult> {
        let settings = self.config.settings(def.name);

        let explicit: Option<Vec<String>> = match selection {
            PackageSelection::All => None,
            PackageSelection::Explicit(dirs) => Some(packages::filter_explicit(dirs, &self.exclude)),
        };

        let package_args = self.package_args(def, explicit.as_deref())?;
        if package_args.is_empty() {
            log::debug!("{}: no packages to check", def.name);
            return Ok(CheckResult::new(def.name, Vec::new()));
        }

        let mut cmd = self.command(def)?;
        cmd.args(&settings.args).args(&package_args).current_dir(&self.root);
        let out = process::run_combined(cmd, def.name)?;

        let parser = def
            .parser
            .build(PathResolver::new(def.path_type, self.workspace.clone()));
        let prefilter = def.prefilter.build()?;
        let issues = parse_output(&out.output, parser.as_ref(), prefilter.as_ref(), &self.root)?;

        let mut filters: Vec<BoxFilter> = self.exclude.filters()?;
        for f in &settings.filters {
            filters.push(f.compile()?);
        }
        let mut issues = filter::apply(issues, &filters);

        if let Some(dirs) = &explicit {
            if def.invocation == Invocation::WholeTree {
                issues = restrict_to(issues, dirs);
            }
            order_by_packages(&mut issues, dirs);
        }
        log::debug!("{}: {} issue(s)", def.name, issues.len());
        Ok(CheckResult::new(def.name, issues))
    }

    /// Arguments naming what `def` should look at.
    fn package_args(&self, def: &CheckDefinition, explicit: Option<&[String]>) -> Result<Vec<String>> {
        Ok(match (explicit, def.invocation) {
            (_, Invocation::WholeTree) => vec![all_form_arg(def.all_form)],
            (Some(dirs), Invocation::PerPackage) => dirs.iter().map(|d| package_arg(d)).collect(),
            (None, Invocation::PerPackage) => match def.all_form {
                AllForm::Enumerate => packages::enumerate(&self.root, &self.exclude, &self.build)?
                    .iter()
                    .map(|p| p.arg())
                    .collect(),
                form => vec![all_form_arg(form)],
            },
            (Some(dirs), Invocation::PerFile) => self.files_of(dirs.iter().map(String::as_str))?,
            (None, Invocation::PerFile) => {
                let pkgs = packages::enumerate(&self.root, &self.exclude, &self.build)?;
                self.files_of(pkgs.iter().map(|p| p.dir()))?
            }
        })
    }

    fn files_of<'a, I>(&self, dirs: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut files = Vec::new();
        for dir in dirs {
            files.extend(packages::source_files(&self.root, dir)?);
        }
        Ok(files)
    }

    fn command(&self, def: &CheckDefinition) -> Result<Command> {
        match def.program {
            Program::External { command, args } => {
                let mut cmd = Command::new(command);
                cmd.args(args);
                Ok(cmd)
            }
            Program::Builtin => {
                let exe = match &self.self_exe {
                    Some(exe) => exe.clone(),
                    None => std::env::current_exe()?,
                };
                let mut cmd = Command::new(exe);
                cmd.arg(format!("{}{}", crate::dispatch::PREFIX, def.name));
                Ok(cmd)
            }
        }
    }
}

fn all_form_arg(form: AllForm) -> String {
    match form {
        AllForm::Recursive => "./...".to_string(),
        AllForm::Dot | AllForm::Enumerate => ".".to_string(),
    }
}

/// Keep issues located in `dirs`, plus issues with no location.
fn restrict_to(issues: Vec<Issue>, dirs: &[String]) -> Vec<Issue> {
    let wanted: HashSet<&str> = dirs.iter().map(String::as_str).collect();
    issues
        .into_iter()
        .filter(|i| match i.dir() {
            Some(dir) => wanted.contains(dir.as_str()),
            None => i.path().is_empty(),
        })
        .collect()
}

/// Stable sort by the position of each issue's directory in `dirs`; issues
/// outside them keep their order at the end.
fn order_by_packages(issues: &mut [Issue], dirs: &[String]) {
    let rank: HashMap<&str, usize> = dirs
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();
    issues.sort_by_key(|issue| {
        issue
            .dir()
            .and_then(|d| rank.get(d.as_str()).copied())
            .unwrap_or(usize::MAX)
    });
}
