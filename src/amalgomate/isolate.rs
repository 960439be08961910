//! Per-project copies of the `flag` package.
//!
//! Every amalgomated program that uses `flag` would otherwise share
//! `flag.CommandLine` with the others in the same binary. Each project that
//! imports it gets a private copy under `amalgomated_flag` instead.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::gosrc::GoFile;
use crate::paths::join_import;
use crate::process;

use super::copier::copy_tree;

/// Directory (and last import path element) of the vendored flag package.
pub const VENDORED_FLAG_DIR: &str = "amalgomated_flag";

/// Import path of the vendored flag package for a project.
pub fn vendored_flag_path(project_import: &str) -> String {
    join_import(project_import, VENDORED_FLAG_DIR)
}

/// Whether any of `files` imports `flag`.
pub fn imports_flag(files: &[PathBuf]) -> Result<bool> {
    for file in files {
        if GoFile::read(file)?.imports()?.iter().any(|i| i.path == "flag") {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Copy `$GOROOT/src/flag` into `dest_project/amalgomated_flag`.
pub fn vendor_flag(goroot: &Path, dest_project: &Path) -> Result<PathBuf> {
    let src = goroot.join("src").join("flag");
    let dest = dest_project.join(VENDORED_FLAG_DIR);
    copy_tree(&src, &dest)?;
    log::debug!("vendored flag into {}", dest.display());
    Ok(dest)
}

/// Locate GOROOT: an explicit value, then `$GOROOT`, then `go env GOROOT`.
pub fn resolve_goroot(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(env) = std::env::var_os("GOROOT").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(env));
    }
    let mut cmd = std::process::Command::new("go");
    cmd.args(["env", "GOROOT"]);
    let out = process::run_combined(cmd, "go env")?;
    let root = out.output.trim();
    if !out.success() || root.is_empty() {
        return Err(Error::config(format!("unable to determine GOROOT: {}", root)));
    }
    Ok(PathBuf::from(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_vendor_flag() {
        let temp = TempDir::new().unwrap();
        let goroot = temp.path().join("goroot");
        fs::create_dir_all(goroot.join("src/flag")).unwrap();
        fs::write(goroot.join("src/flag/flag.go"), "package flag\n").unwrap();
        fs::write(goroot.join("src/flag/flag_test.go"), "package flag\n").unwrap();

        let project = temp.path().join("out/proj");
        fs::create_dir_all(&project).unwrap();
        let dest = vendor_flag(&goroot, &project).unwrap();
        assert!(dest.join("flag.go").is_file());
        assert!(!dest.join("flag_test.go").exists());
    }

    #[test]
    fn test_imports_flag() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.go");
        let b = temp.path().join("b.go");
        fs::write(&a, "package main\n\nimport \"fmt\"\n").unwrap();
        fs::write(&b, "package main\n\nimport f \"flag\"\n").unwrap();
        assert!(!imports_flag(&[a.clone()]).unwrap());
        assert!(imports_flag(&[a, b]).unwrap());
    }

    #[test]
    fn test_explicit_goroot_wins() {
        let root = resolve_goroot(Some(Path::new("/opt/go"))).unwrap();
        assert_eq!(root, PathBuf::from("/opt/go"));
    }

    #[test]
    fn test_vendored_flag_path() {
        assert_eq!(
            vendored_flag_path("example.com/out/internal/example.com/x"),
            "example.com/out/internal/example.com/x/amalgomated_flag"
        );
    }
}
