//! Checks implemented by gokart itself.
//!
//! These run as separate processes through the dispatcher (`gokart
//! _importalias .`) so the driver treats them exactly like external tools.
//! Each prints one finding per line and exits 1 when it found anything.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use clap::Parser;
use walkdir::WalkDir;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::filter::Exclude;
use crate::gosrc::{is_go_source, is_std_import, BuildContext, GoFile, ImportSpec};
use crate::packages::{self, normalize_dir};
use crate::paths::{strip_import_prefix, to_slash, Workspace};

/// Dispatcher holding every built-in check.
pub fn dispatcher() -> Dispatcher {
    Dispatcher::new()
        .routine("extimport", extimport_main)
        .routine("importalias", importalias_main)
        .routine("novendor", novendor_main)
}

/// Arguments shared by the built-in checks.
#[derive(Parser, Debug)]
struct BuiltinArgs {
    /// Package directories relative to the working directory
    packages: Vec<String>,
}

fn run_builtin<F>(argv: &[String], check: F) -> i32
where
    F: FnOnce(&Path, &[String]) -> Result<Vec<String>>,
{
    let args = match BuiltinArgs::try_parse_from(argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return 2;
        }
    };
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("{}: {}", argv.first().map(String::as_str).unwrap_or("gokart"), e);
            return 2;
        }
    };
    match check(&cwd, &args.packages) {
        Ok(findings) if findings.is_empty() => 0,
        Ok(findings) => {
            for line in findings {
                println!("{}", line);
            }
            1
        }
        Err(e) => {
            eprintln!("{}: {}", argv.first().map(String::as_str).unwrap_or("gokart"), e);
            2
        }
    }
}

fn extimport_main(argv: &[String]) -> i32 {
    run_builtin(argv, extimport)
}

fn importalias_main(argv: &[String]) -> i32 {
    run_builtin(argv, |root, _| importalias(root))
}

fn novendor_main(argv: &[String]) -> i32 {
    run_builtin(argv, |root, _| novendor(root))
}

/// `file:line:col` of an import spec, relative to `root`.
fn location(root: &Path, file: &Path, spec: &ImportSpec) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    format!(
        "{}:{}:{}",
        to_slash(rel),
        spec.spec_span.start_row + 1,
        spec.spec_span.start_col + 1
    )
}

/// Go files directly in `dir`, test files included.
fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && is_go_source(&name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Go files under `root`, outside vendor, testdata and hidden directories.
fn project_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !(name.starts_with('.') || name.starts_with('_') || name == "vendor" || name == "testdata")
        });
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_go_source(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Whether `import` is provided by `<root>/vendor`.
fn is_vendored(root: &Path, import: &str) -> bool {
    root.join("vendor").join(import).is_dir()
}

/// Flag imports that are neither standard library, inside the project, nor
/// vendored.
pub fn extimport(root: &Path, dirs: &[String]) -> Result<Vec<String>> {
    let workspace = Workspace::discover(root)?;
    let project = workspace.to_import_path(root).unwrap_or_default();

    let dirs: Vec<String> = if dirs.is_empty() {
        packages::enumerate(root, &Exclude::default(), &BuildContext::default())?
            .iter()
            .map(|p| p.dir().to_string())
            .collect()
    } else {
        dirs.iter().map(|d| normalize_dir(d)).collect()
    };

    let mut findings = Vec::new();
    for dir in dirs {
        let abs = if dir == "." { root.to_path_buf() } else { root.join(&dir) };
        for file in files_in(&abs)? {
            for spec in GoFile::read(&file)?.imports()? {
                let internal = !project.is_empty() && strip_import_prefix(&spec.path, &project).is_some();
                if is_std_import(&spec.path) || internal || is_vendored(root, &spec.path) {
                    continue;
                }
                findings.push(format!(
                    "{}: imports external package {}",
                    location(root, &file, &spec),
                    spec.path
                ));
            }
        }
    }
    Ok(findings)
}

/// Flag imports that use a different alias for a package than the rest of
/// the project does.
pub fn importalias(root: &Path) -> Result<Vec<String>> {
    // import path -> alias -> usages
    let mut usages: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    for file in project_files(root)? {
        for spec in GoFile::read(&file)?.imports()? {
            let alias = match spec.alias.as_deref() {
                Some("_") | Some(".") | None => continue,
                Some(alias) => alias.to_string(),
            };
            usages
                .entry(spec.path.clone())
                .or_default()
                .entry(alias)
                .or_default()
                .push(location(root, &file, &spec));
        }
    }

    let mut findings = Vec::new();
    for (import, aliases) in usages {
        if aliases.len() < 2 {
            continue;
        }
        let recommended = recommended_alias(&aliases);
        for (alias, locations) in &aliases {
            if alias == recommended {
                continue;
            }
            for loc in locations {
                findings.push(format!(
                    "{}: uses alias \"{}\" to import package {}. Use alias \"{}\" instead.",
                    loc, alias, import, recommended
                ));
            }
        }
    }
    findings.sort();
    Ok(findings)
}

/// The most used alias; ties go to the lexicographically first.
fn recommended_alias(aliases: &BTreeMap<String, Vec<String>>) -> &str {
    let mut best: Option<(&str, usize)> = None;
    for (alias, locations) in aliases {
        match best {
            Some((_, count)) if count >= locations.len() => {}
            _ => best = Some((alias.as_str(), locations.len())),
        }
    }
    best.map(|(a, _)| a).unwrap_or("")
}

/// Flag vendored packages nothing in the project reaches.
pub fn novendor(root: &Path) -> Result<Vec<String>> {
    let vendor = root.join("vendor");
    if !vendor.is_dir() {
        return Ok(Vec::new());
    }

    let mut vendored: BTreeSet<String> = BTreeSet::new();
    for entry in WalkDir::new(&vendor).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() && !files_in(entry.path())?.is_empty() {
            if let Ok(rel) = entry.path().strip_prefix(&vendor) {
                let rel = to_slash(rel);
                if !rel.is_empty() {
                    vendored.insert(rel);
                }
            }
        }
    }

    let mut queue: VecDeque<String> = VecDeque::new();
    for file in project_files(root)? {
        for spec in GoFile::read(&file)?.imports()? {
            queue.push_back(spec.path);
        }
    }

    let mut used: BTreeSet<String> = BTreeSet::new();
    while let Some(import) = queue.pop_front() {
        if !vendored.contains(&import) || !used.insert(import.clone()) {
            continue;
        }
        for file in files_in(&vendor.join(&import))? {
            for spec in GoFile::read(&file)?.imports()? {
                queue.push_back(spec.path);
            }
        }
    }

    Ok(vendored.difference(&used).cloned().collect())
}
