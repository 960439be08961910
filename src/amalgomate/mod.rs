//! Amalgomation: merging standalone Go programs into one vendored tree.
//!
//! Each program's project root is copied under `<output>/internal/<import
//! path>`, its imports are rewritten to the copy, its `main` becomes
//! [`ENTRY_ROUTINE`], and a generated dispatch file maps program names to
//! those routines.
//!
//! ```text
//! <output>/
//!   amalgomated.go                         dispatch map
//!   internal/example.com/x/gofmt/...       rewritten copy
//!   internal/example.com/x/gofmt/amalgomated_flag/   private flag package
//! ```

pub mod copier;
pub mod dispatch_file;
pub mod isolate;
pub mod rewrite;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AmalgomateConfig;
use crate::error::{Error, Result};
use crate::gosrc::GoFile;
use crate::paths::{self, join_import, strip_import_prefix, Workspace};

use copier::Copier;
use rewrite::{rewrite_file, RewriteRules};

/// Package name given to former `main` packages.
pub const PACKAGE_NAME: &str = "amalgomated";
/// Name given to former `main` functions.
pub const ENTRY_ROUTINE: &str = "AmalgomatedMain";
/// Name of the generated dispatch file.
pub const DISPATCH_FILE: &str = "amalgomated.go";
/// Name of the generated dispatch map variable.
pub const DISPATCH_MAP_VAR: &str = "Instance";
/// Directory under the output that holds copied projects.
pub const INTERNAL_DIR: &str = "internal";

/// One copied project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub source_import: String,
    pub dest_import: String,
    pub vendored_flag: bool,
}

/// What an amalgomation run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Program name to the alias its entry package is imported as.
    pub programs: BTreeMap<String, String>,
    pub projects: Vec<ProjectRecord>,
    pub dispatch_file: PathBuf,
}

/// Options for a run.
#[derive(Debug, Clone)]
pub struct Options {
    pub output_dir: PathBuf,
    /// Package clause of the dispatch file; defaults to the output
    /// directory's base name.
    pub package: Option<String>,
    pub goroot: Option<PathBuf>,
}

/// Drives a whole amalgomation.
pub struct Amalgomator {
    config: AmalgomateConfig,
    workspace: Workspace,
    options: Options,
}

impl Amalgomator {
    pub fn new(config: AmalgomateConfig, workspace: Workspace, options: Options) -> Self {
        Self {
            config,
            workspace,
            options,
        }
    }

    fn package_name(&self) -> Result<String> {
        if let Some(pkg) = &self.options.package {
            return Ok(pkg.clone());
        }
        let base = self
            .options
            .output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::config("output directory has no name; pass --package"))?;
        Ok(dispatch_file::sanitize_alias(&base))
    }

    /// Run the amalgomation and write every output file.
    pub fn run(&self) -> Result<Manifest> {
        self.config.validate()?;
        let output_dir = paths::absolute(&self.options.output_dir)?;
        let output_import = self.workspace.to_import_path(&output_dir)?;
        let package = self.package_name()?;

        let internal = output_dir.join(INTERNAL_DIR);
        if internal.exists() {
            log::debug!("clearing {}", internal.display());
            fs::remove_dir_all(&internal)?;
        }
        fs::create_dir_all(&output_dir)?;

        let mut copier = Copier::new();
        let mut goroot: Option<PathBuf> = None;
        let mut projects = Vec::new();
        let mut entries: BTreeMap<String, String> = BTreeMap::new();

        for (name, spec) in &self.config.packages {
            let project_import = spec.project_import_path()?;
            let entry_dir = self.workspace.resolve_dir(&spec.main)?;
            let mut project_dir = entry_dir.clone();
            for _ in 0..spec.distance_to_project_pkg {
                project_dir = project_dir.parent().map(Path::to_path_buf).ok_or_else(|| {
                    Error::config(format!("program {}: project root above filesystem root", name))
                })?;
            }

            let dest_import = join_import(
                &output_import,
                &format!("{}/{}", INTERNAL_DIR, project_import),
            );
            let dest_dir = internal.join(&project_import);

            if let Some(files) = copier.copy_project(&project_dir, &dest_dir)? {
                let vendored_flag = isolate::imports_flag(&files)?;
                let flag_path = if vendored_flag {
                    if goroot.is_none() {
                        goroot = Some(isolate::resolve_goroot(self.options.goroot.as_deref())?);
                    }
                    if let Some(root) = &goroot {
                        isolate::vendor_flag(root, &dest_dir)?;
                    }
                    Some(isolate::vendored_flag_path(&dest_import))
                } else {
                    None
                };

                let rules = RewriteRules {
                    from_prefix: project_import.clone(),
                    to_prefix: dest_import.clone(),
                    local_prefix: output_import.clone(),
                    flag_path,
                };
                for file in &files {
                    rewrite_file(file, &rules)?;
                }
                projects.push(ProjectRecord {
                    source_dir: project_dir.clone(),
                    dest_dir: dest_dir.clone(),
                    source_import: project_import.clone(),
                    dest_import: dest_import.clone(),
                    vendored_flag,
                });
            }

            let rel = strip_import_prefix(&spec.main, &project_import).unwrap_or("");
            let entry_dest = if rel.is_empty() { dest_dir.clone() } else { dest_dir.join(rel) };
            ensure_entry(name, &entry_dest)?;
            entries.insert(name.clone(), join_import(&dest_import, rel));
        }

        let aliases = dispatch_file::assign_aliases(&entries);
        let content = dispatch_file::render(&package, &entries, &aliases, &output_import);
        let dispatch_path = output_dir.join(DISPATCH_FILE);
        fs::write(&dispatch_path, content)?;
        log::debug!("wrote {}", dispatch_path.display());

        let programs = entries
            .iter()
            .map(|(name, import)| (name.clone(), aliases.get(import).cloned().unwrap_or_default()))
            .collect();
        Ok(Manifest {
            programs,
            projects,
            dispatch_file: dispatch_path,
        })
    }
}

/// Fail unless some file in `dir` defines the entry routine.
fn ensure_entry(program: &str, dir: &Path) -> Result<()> {
    let missing = || Error::MissingMain {
        program: program.to_string(),
        dir: dir.to_path_buf(),
    };
    if !dir.is_dir() {
        return Err(missing());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_go = path.extension().map(|e| e == "go").unwrap_or(false);
        if is_go && path.is_file() && GoFile::read(&path)?.summary()?.has_entry {
            return Ok(());
        }
    }
    Err(missing())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgramSpec;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(entries: &[(&str, &str, usize)]) -> AmalgomateConfig {
        let mut config = AmalgomateConfig::default();
        for (name, main, distance) in entries {
            config.packages.insert(
                name.to_string(),
                ProgramSpec {
                    main: main.to_string(),
                    distance_to_project_pkg: *distance,
                },
            );
        }
        config
    }

    #[test]
    fn test_shared_project_root_copied_once() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "example.com/suite/cmd/a/main.go", "package main\n\nfunc main() {}\n");
        write(&src, "example.com/suite/cmd/b/main.go", "package main\n\nfunc main() {}\n");
        write(&src, "example.com/suite/lib/lib.go", "package lib\n");

        let amalgomator = Amalgomator::new(
            config(&[
                ("a", "example.com/suite/cmd/a", 2),
                ("b", "example.com/suite/cmd/b", 2),
            ]),
            Workspace::gopath(temp.path()),
            Options {
                output_dir: src.join("example.com/out"),
                package: None,
                goroot: None,
            },
        );
        let manifest = amalgomator.run().unwrap();
        assert_eq!(manifest.projects.len(), 1);
        assert_eq!(manifest.programs["a"], "a");
        assert_eq!(manifest.programs["b"], "b");
        let out = src.join("example.com/out/internal/example.com/suite");
        assert!(out.join("lib/lib.go").is_file());
        assert!(out.join("cmd/a/main.go").is_file());
    }

    #[test]
    fn test_missing_main() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "example.com/x/lib/lib.go", "package lib\n");
        let amalgomator = Amalgomator::new(
            config(&[("lib", "example.com/x/lib", 0)]),
            Workspace::gopath(temp.path()),
            Options {
                output_dir: src.join("example.com/out"),
                package: Some("out".to_string()),
                goroot: None,
            },
        );
        assert!(matches!(amalgomator.run(), Err(Error::MissingMain { .. })));
    }

    #[test]
    fn test_output_outside_workspace() {
        let temp = TempDir::new().unwrap();
        let amalgomator = Amalgomator::new(
            config(&[("x", "example.com/x", 0)]),
            Workspace::gopath(temp.path().join("gopath")),
            Options {
                output_dir: temp.path().join("elsewhere"),
                package: None,
                goroot: None,
            },
        );
        assert!(matches!(amalgomator.run(), Err(Error::PathEscapesWorkspace { .. })));
    }
}
