//! Placeholder test files for packages that have no tests.
//!
//! `go test` skips packages without test files, so they would never be
//! compiled. A placeholder gives each of them an empty test file. The
//! placeholders are removed when the [`Placeholders`] guard is dropped,
//! when [`Placeholders::cleanup`] is called, or from the exit handler when
//! the process is interrupted, whichever happens first.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::shutdown::{self, HandlerId, Priority};

/// Name of every placeholder file.
pub const PLACEHOLDER_FILE: &str = "tmp_placeholder_test.go";

/// Contents of a placeholder for `package`.
pub fn placeholder_source(package: &str) -> String {
    format!("package {}\n\n// Placeholder test file created by gokart test.\n", package)
}

type Written = Arc<Mutex<Vec<PathBuf>>>;

/// Scope guard owning the placeholders written so far.
#[derive(Debug)]
pub struct Placeholders {
    written: Written,
    handler: HandlerId,
}

impl Placeholders {
    pub fn new() -> Self {
        let written: Written = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&written);
        let handler = shutdown::register(Priority::First, move || remove_all(&shared));
        Self { written, handler }
    }

    /// Write a placeholder for `package` into `dir`.
    ///
    /// On failure every placeholder written so far is removed before the
    /// error is returned.
    pub fn write(&self, dir: &Path, package: &str) -> Result<PathBuf> {
        let path = self.record(dir);
        if let Err(source) = fs::write(&path, placeholder_source(package)) {
            self.cleanup();
            return Err(Error::PlaceholderWrite { path, source });
        }
        log::debug!("wrote placeholder {}", path.display());
        Ok(path)
    }

    /// Claim the placeholder path in `dir` for cleanup before anything is
    /// written there.
    fn record(&self, dir: &Path) -> PathBuf {
        let path = dir.join(PLACEHOLDER_FILE);
        match self.written.lock() {
            Ok(mut written) => written.push(path.clone()),
            Err(poisoned) => poisoned.into_inner().push(path.clone()),
        }
        path
    }

    /// Paths claimed so far and not yet removed.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Remove every placeholder. Safe to call more than once.
    pub fn cleanup(&self) {
        remove_all(&self.written);
    }
}

impl Default for Placeholders {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Placeholders {
    fn drop(&mut self) {
        shutdown::unregister(self.handler);
        self.cleanup();
    }
}

fn remove_all(written: &Mutex<Vec<PathBuf>>) {
    let paths = match written.lock() {
        Ok(mut w) => std::mem::take(&mut *w),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("removed placeholder {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_drop_removes_placeholders() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        fs::create_dir(&a).unwrap();
        let path = {
            let guard = Placeholders::new();
            let path = guard.write(&a, "a").unwrap();
            assert_eq!(
                fs::read_to_string(&path).unwrap(),
                "package a\n\n// Placeholder test file created by gokart test.\n"
            );
            path
        };
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn test_cleanup_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let guard = Placeholders::new();
        let path = guard.write(temp.path(), "p").unwrap();
        guard.cleanup();
        guard.cleanup();
        assert!(!path.exists());
        assert!(guard.paths().is_empty());
    }

    #[test]
    #[serial]
    fn test_exit_handler_removes_placeholders() {
        let temp = TempDir::new().unwrap();
        let guard = Placeholders::new();
        let path = guard.write(temp.path(), "p").unwrap();
        shutdown::run_handlers();
        assert!(!path.exists());
        drop(guard);
    }

    #[test]
    #[serial]
    fn test_write_failure_cleans_up() {
        let temp = TempDir::new().unwrap();
        let guard = Placeholders::new();
        let first = guard.write(temp.path(), "p").unwrap();
        let err = guard.write(&temp.path().join("missing"), "q").unwrap_err();
        assert!(matches!(err, Error::PlaceholderWrite { .. }));
        assert!(!first.exists());
    }

    #[test]
    #[serial]
    fn test_claimed_path_is_removed_on_interrupt() {
        let temp = TempDir::new().unwrap();
        let guard = Placeholders::new();
        let path = guard.record(temp.path());
        // The file appears after the claim, as if the write raced a signal.
        fs::write(&path, "package p\n").unwrap();
        shutdown::run_handlers();
        assert!(!path.exists());
        drop(guard);
    }
}
