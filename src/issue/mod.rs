//! Issues reported by analysis tools and the parsers that produce them.

pub mod aggregate;
pub mod parsers;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::paths;

pub use aggregate::{parse_issues, parse_output, LinePrefilter};
pub use parsers::{LineParser, ParserKind, PathResolver};

/// A single finding.
///
/// `path` is relative to `base_dir` when the tool reported a location inside
/// it, the path as reported otherwise, and empty for findings that are not
/// tied to a file. Line and column are 1-based; 0 means unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    path: String,
    line: u32,
    column: u32,
    message: String,
    base_dir: PathBuf,
}

impl Issue {
    pub fn new(
        path: impl Into<String>,
        line: u32,
        column: u32,
        message: impl AsRef<str>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            line,
            column,
            message: message.as_ref().trim().to_string(),
            base_dir: base_dir.into(),
        }
    }

    /// An issue with no location.
    pub fn message_only(message: impl AsRef<str>, base_dir: impl Into<PathBuf>) -> Self {
        Self::new(String::new(), 0, 0, message, base_dir)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute location of the file, when the issue has one.
    pub fn absolute_path(&self) -> Option<PathBuf> {
        if self.path.is_empty() {
            return None;
        }
        let p = Path::new(&self.path);
        Some(if p.is_absolute() {
            paths::clean(p)
        } else {
            paths::clean(&self.base_dir.join(p))
        })
    }

    /// Root-relative directory of the file, `.` for the root itself.
    pub fn dir(&self) -> Option<String> {
        if self.path.is_empty() || Path::new(&self.path).is_absolute() {
            return None;
        }
        let parent = paths::to_slash(Path::new(&self.path).parent().unwrap_or(Path::new("")));
        Some(if parent.is_empty() { ".".to_string() } else { parent })
    }

    /// The same issue expressed relative to another directory.
    pub fn rebase<P: AsRef<Path>>(&self, new_base: P) -> Issue {
        let new_base = new_base.as_ref();
        let path = match self.absolute_path() {
            Some(abs) => match paths::relativize(&abs, new_base) {
                Ok(rel) => paths::to_slash(&rel),
                Err(_) => abs.to_string_lossy().into_owned(),
            },
            None => String::new(),
        };
        Issue {
            path,
            line: self.line,
            column: self.column,
            message: self.message.clone(),
            base_dir: new_base.to_path_buf(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "{}", self.message);
        }
        write!(f, "{}", self.path)?;
        if self.line > 0 {
            write!(f, ":{}", self.line)?;
            if self.column > 0 {
                write!(f, ":{}", self.column)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let issue = Issue::new("foo/bar.go", 12, 4, "undeclared name x", "/proj");
        assert_eq!(issue.to_string(), "foo/bar.go:12:4: undeclared name x");

        let no_col = Issue::new("foo/bar.go", 12, 0, "m", "/proj");
        assert_eq!(no_col.to_string(), "foo/bar.go:12: m");

        let bare = Issue::message_only("  gofmt needed  ", "/proj");
        assert_eq!(bare.to_string(), "gofmt needed");
    }

    #[test]
    fn test_rebase() {
        let issue = Issue::new("pkg/a.go", 1, 2, "m", "/proj");
        let rebased = issue.rebase("/proj/pkg");
        assert_eq!(rebased.path(), "a.go");
        assert_eq!(rebased.base_dir(), Path::new("/proj/pkg"));

        let outside = issue.rebase("/elsewhere");
        assert_eq!(outside.path(), "/proj/pkg/a.go");
    }

    #[test]
    fn test_dir() {
        assert_eq!(Issue::new("pkg/a.go", 1, 1, "m", "/p").dir().as_deref(), Some("pkg"));
        assert_eq!(Issue::new("a.go", 1, 1, "m", "/p").dir().as_deref(), Some("."));
        assert_eq!(Issue::message_only("m", "/p").dir(), None);
    }
}
