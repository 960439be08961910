//! Copies Go source trees for amalgomation.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::gosrc::is_test_file;

/// Whether a file belongs in a copied tree.
fn is_copied_file(name: &str) -> bool {
    name.ends_with(".go") && !is_test_file(name)
}

/// Copy the non-test Go sources under `src` to `dest`.
///
/// `testdata` directories are skipped. `dest` must not exist. Returns the
/// destination paths of the copied files in walk order.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    if dest.exists() {
        return Err(Error::DirectoryCollision(dest.to_path_buf()));
    }
    if !src.is_dir() {
        return Err(Error::config(format!("source directory {} does not exist", src.display())));
    }

    let mut copied = Vec::new();
    let walker = WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.depth() > 0 && e.file_name() == "testdata"));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_copied_file(&name) {
            continue;
        }
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        copied.push(target);
    }
    fs::create_dir_all(dest)?;
    log::debug!("copied {} file(s) from {} to {}", copied.len(), src.display(), dest.display());
    Ok(copied)
}

/// Copies each project root at most once per run.
#[derive(Debug, Default)]
pub struct Copier {
    done: HashSet<PathBuf>,
}

impl Copier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `src` to `dest` unless this copier already did. Returns `None`
    /// for a repeated request.
    pub fn copy_project(&mut self, src: &Path, dest: &Path) -> Result<Option<Vec<PathBuf>>> {
        if self.done.contains(dest) {
            return Ok(None);
        }
        let files = copy_tree(src, dest)?;
        self.done.insert(dest.to_path_buf());
        Ok(Some(files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "package x\n").unwrap();
    }

    #[test]
    fn test_copy_filters() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "main.go");
        write(&src, "main_test.go");
        write(&src, "README.md");
        write(&src, "lib/lib.go");
        write(&src, "lib/testdata/fixture.go");
        write(&src, "vendor/dep/dep.go");

        let dest = temp.path().join("dest");
        let files = copy_tree(&src, &dest).unwrap();
        let mut rel: Vec<String> = files
            .iter()
            .map(|f| f.strip_prefix(&dest).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        rel.sort();
        assert_eq!(rel, vec!["lib/lib.go", "main.go", "vendor/dep/dep.go"]);
        assert!(!dest.join("README.md").exists());
        assert!(!dest.join("lib/testdata").exists());
    }

    #[test]
    fn test_destination_collision() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "main.go");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        assert!(matches!(copy_tree(&src, &dest), Err(Error::DirectoryCollision(_))));
    }

    #[test]
    fn test_copier_copies_once() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "main.go");
        let dest = temp.path().join("dest");
        let mut copier = Copier::new();
        assert_eq!(copier.copy_project(&src, &dest).unwrap().map(|f| f.len()), Some(1));
        assert!(copier.copy_project(&src, &dest).unwrap().is_none());
    }
}
