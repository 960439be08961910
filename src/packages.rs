//! Go package discovery.
//!
//! Walks a project root and reports every directory holding a buildable Go
//! package. Only package clauses are read; files excluded by build
//! constraints do not count, and `X_test` external test packages fold into
//! `X`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::filter::Exclude;
use crate::gosrc::{is_go_source, is_test_file, scan_package_clause, BuildContext};
use crate::paths::to_slash;

/// Directory names never treated as packages.
const SKIPPED_DIRS: &[&str] = &["testdata", "vendor"];

/// A package found under a project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Package {
    dir: String,
    name: String,
}

impl Package {
    pub fn new(dir: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Root-relative directory with `/` separators, `.` for the root.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The form the go command accepts: `./dir` or `.`.
    pub fn arg(&self) -> String {
        package_arg(&self.dir)
    }

    pub fn abs_dir(&self, root: &Path) -> PathBuf {
        if self.dir == "." {
            root.to_path_buf()
        } else {
            root.join(&self.dir)
        }
    }
}

/// Render a root-relative directory as a go command argument.
pub fn package_arg(dir: &str) -> String {
    let dir = dir.trim_start_matches("./").trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        ".".to_string()
    } else {
        format!("./{}", dir)
    }
}

/// Normalize a user-supplied package argument (`./a/b/`, `a/b`, `.`) to a
/// root-relative directory.
pub fn normalize_dir(arg: &str) -> String {
    let dir = arg.trim_start_matches("./").trim_end_matches('/');
    if dir.is_empty() {
        ".".to_string()
    } else {
        dir.to_string()
    }
}

fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || SKIPPED_DIRS.contains(&name)
}

/// Every package under `root`, sorted by directory.
pub fn enumerate(root: &Path, exclude: &Exclude, ctx: &BuildContext) -> Result<Vec<Package>> {
    let mut packages = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if is_skipped_dir(&name) {
                return false;
            }
            match e.path().strip_prefix(root) {
                Ok(rel) => !exclude.matches(rel),
                Err(_) => true,
            }
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(name) = buildable_package_name(entry.path(), ctx)? {
            let rel = entry.path().strip_prefix(root).unwrap_or(Path::new(""));
            let rel = to_slash(rel);
            let dir = if rel.is_empty() { ".".to_string() } else { rel };
            packages.push(Package::new(dir, name));
        }
    }
    log::debug!("found {} package(s) under {}", packages.len(), root.display());
    Ok(packages)
}

/// Keep the explicitly requested directories that are not excluded.
pub fn filter_explicit(dirs: &[String], exclude: &Exclude) -> Vec<String> {
    dirs.iter()
        .map(|d| normalize_dir(d))
        .filter(|d| d == "." || !exclude.matches(Path::new(d)))
        .collect()
}

/// Go source files directly inside `dir`, sorted by name.
fn go_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_go_source(&name) {
            files.push((name, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Package names declared by the files of `dir` that pass `keep`.
fn declared_names<F>(dir: &Path, mut keep: F) -> Result<BTreeSet<String>>
where
    F: FnMut(&str, &str) -> bool,
{
    let mut names = BTreeSet::new();
    for (file_name, path) in go_files(dir)? {
        let source = fs::read_to_string(&path)?;
        if !keep(&file_name, &source) {
            continue;
        }
        if let Some(name) = scan_package_clause(&source) {
            let name = match name.strip_suffix("_test") {
                Some(base) if is_test_file(&file_name) && !base.is_empty() => base.to_string(),
                _ => name,
            };
            names.insert(name);
        }
    }
    Ok(names)
}

/// The single package built from `dir` under `ctx`, if any.
pub fn buildable_package_name(dir: &Path, ctx: &BuildContext) -> Result<Option<String>> {
    let names = declared_names(dir, |name, source| ctx.matches_file(name, source))?;
    single_name(dir, names)
}

fn single_name(dir: &Path, names: BTreeSet<String>) -> Result<Option<String>> {
    match names.len() {
        0 => Ok(None),
        1 => Ok(names.into_iter().next()),
        _ => Err(Error::MultiplePackages {
            dir: dir.to_path_buf(),
            names: names.into_iter().collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Package name to use for a file added to `dir`.
///
/// The constraint-aware answer wins; the package clauses of all files are
/// consulted only when no file survives the build constraints.
pub fn package_name_for_new_file(dir: &Path, ctx: &BuildContext) -> Result<Option<String>> {
    if let Some(name) = buildable_package_name(dir, ctx)? {
        return Ok(Some(name));
    }
    let raw = declared_names(dir, |_, _| true)?;
    Ok(raw.into_iter().next())
}

/// Non-test Go files of the package directory `dir`, as root-relative
/// paths.
pub fn source_files(root: &Path, dir: &str) -> Result<Vec<String>> {
    let abs = if dir == "." { root.to_path_buf() } else { root.join(dir) };
    Ok(go_files(&abs)?
        .into_iter()
        .filter(|(name, _)| !is_test_file(name))
        .map(|(name, _)| if dir == "." { name } else { format!("{}/{}", dir, name) })
        .collect())
}

/// Whether `dir` already contains test files.
pub fn has_test_files(dir: &Path) -> Result<bool> {
    Ok(go_files(dir)?.iter().any(|(name, _)| is_test_file(name)))
}
